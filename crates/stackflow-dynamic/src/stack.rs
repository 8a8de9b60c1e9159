//! Engine boundary: declaring resources and exporting stack outputs
//!
//! Programs never talk to the orchestration engine directly. They build a
//! [`Stack`] around a [`ResourceMonitor`] (the engine connection, or a mock
//! in tests), declare resources with [`Stack::declare`] and export values with
//! [`Stack::export`]. Resource inputs may be pending [`Output`]s of other
//! resources; registration waits for them, so the dependency graph stays the
//! engine's concern.

use crate::error::{DynamicError, Result};
use crate::output::{Output, OutputError};
use crate::property::PropertyMap;
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Connection to the orchestration engine
#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    /// Declare a resource and wait for the engine to provision it
    async fn register_resource(
        &self,
        request: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse>;

    /// Report the stack's exported outputs
    async fn register_outputs(&self, outputs: PropertyMap) -> Result<()>;
}

/// A fully resolved resource declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResourceRequest {
    pub type_token: String,
    pub name: String,
    pub urn: String,
    pub inputs: PropertyMap,
    pub parent: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub provider: Option<String>,
    #[serde(default)]
    pub additional_secret_outputs: Vec<String>,
    #[serde(default)]
    pub delete_before_replace: bool,
}

/// What the engine reports back for a registered resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResourceResponse {
    pub urn: String,
    pub id: String,
    pub outputs: PropertyMap,
}

/// A single resource input: a known value or another resource's pending output
#[derive(Debug, Clone)]
pub enum Input {
    Value(Value),
    Output(Output<Value>),
}

impl Input {
    async fn resolve(self) -> std::result::Result<(Value, bool), OutputError> {
        match self {
            Input::Value(v) => Ok((v, false)),
            Input::Output(o) => o.resolve_with_secret().await,
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Value(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Value(Value::String(value))
    }
}

impl From<Output<Value>> for Input {
    fn from(value: Output<Value>) -> Self {
        Input::Output(value)
    }
}

impl From<Output<String>> for Input {
    fn from(value: Output<String>) -> Self {
        Input::Output(value.apply(Value::String))
    }
}

/// Inputs of a resource declaration
#[derive(Debug, Clone, Default)]
pub struct ResourceArgs {
    entries: Vec<(String, Input, bool)>,
}

impl ResourceArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.entries.push((key.into(), value.into(), false));
        self
    }

    /// Set an input that must be treated as secret even if its source is not
    pub fn set_secret(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.entries.push((key.into(), value.into(), true));
        self
    }

    async fn resolve(self) -> std::result::Result<PropertyMap, OutputError> {
        let mut props = PropertyMap::new();
        for (key, input, force_secret) in self.entries {
            let (value, secret) = input.resolve().await?;
            if secret || force_secret {
                props.insert_secret(key, value);
            } else {
                props.insert(key, value);
            }
        }
        Ok(props)
    }
}

/// Options of a resource declaration
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// URN of the parent resource
    pub parent: Option<String>,
    /// Resources that must be registered before this one
    pub depends_on: Vec<ResourceHandle>,
    /// Explicit provider reference
    pub provider: Option<String>,
    /// Output keys the engine must treat as secret
    pub additional_secret_outputs: Vec<String>,
    /// Request delete-before-replace from the engine
    pub delete_before_replace: bool,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depends_on(mut self, resource: &ResourceHandle) -> Self {
        self.depends_on.push(resource.clone());
        self
    }

    pub fn parent(mut self, resource: &ResourceHandle) -> Self {
        self.parent = Some(resource.urn.clone());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn secret_output(mut self, key: impl Into<String>) -> Self {
        self.additional_secret_outputs.push(key.into());
        self
    }
}

/// Handle to a declared resource
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    pub urn: String,
    pub id: Output<String>,
    pub outputs: Output<PropertyMap>,
}

impl ResourceHandle {
    /// A single output property; secret if the engine marked it so
    pub fn output(&self, key: &str) -> Output<Value> {
        let key = key.to_string();
        let urn = self.urn.clone();
        self.outputs.try_apply(move |outs| {
            let secret = outs.is_secret(&key);
            outs.get(&key).cloned().map(|v| (v, secret)).ok_or_else(|| {
                OutputError::new(format!("output '{}' not found on {}", key, urn))
            })
        })
    }
}

/// One deployable collection of resource declarations and exported outputs
pub struct Stack {
    project: String,
    stack: String,
    monitor: Arc<dyn ResourceMonitor>,
    registrations: Vec<Output<RegisterResourceResponse>>,
    exports: Vec<(String, Output<Value>)>,
}

impl Stack {
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        monitor: Arc<dyn ResourceMonitor>,
    ) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            monitor,
            registrations: Vec::new(),
            exports: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack_name(&self) -> &str {
        &self.stack
    }

    /// Unique resource name within the engine
    pub fn urn(&self, type_token: &str, name: &str) -> String {
        format!(
            "urn:stackflow:{}::{}::{}::{}",
            self.stack, self.project, type_token, name
        )
    }

    /// Declare a resource. Registration starts once all inputs and explicit
    /// dependencies are available.
    pub fn declare(
        &mut self,
        type_token: &str,
        name: &str,
        args: ResourceArgs,
        options: ResourceOptions,
    ) -> ResourceHandle {
        let urn = self.urn(type_token, name);
        let monitor = Arc::clone(&self.monitor);
        let request_urn = urn.clone();
        let type_token = type_token.to_string();
        let name = name.to_string();

        let registration = Output::from_future(async move {
            let inputs = args.resolve().await?;

            let mut dependencies = Vec::with_capacity(options.depends_on.len());
            for dep in &options.depends_on {
                dep.id.resolve().await?;
                dependencies.push(dep.urn.clone());
            }

            tracing::debug!(
                urn = %request_urn,
                inputs = %inputs.redacted(),
                "Registering resource"
            );

            let request = RegisterResourceRequest {
                type_token,
                name,
                urn: request_urn,
                inputs,
                parent: options.parent.clone(),
                dependencies,
                provider: options.provider.clone(),
                additional_secret_outputs: options.additional_secret_outputs.clone(),
                delete_before_replace: options.delete_before_replace,
            };

            let mut response = monitor.register_resource(request).await?;
            for key in &options.additional_secret_outputs {
                response.outputs.mark_secret(key);
            }
            Ok(response)
        });

        self.registrations.push(registration.clone());

        ResourceHandle {
            urn,
            id: registration.apply(|r| r.id),
            outputs: registration.apply(|r| r.outputs),
        }
    }

    /// Register a named stack output
    pub fn export(&mut self, name: impl Into<String>, value: Output<Value>) {
        self.exports.push((name.into(), value));
    }

    /// Register a named stack output whose value is already known
    pub fn export_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.export(name, Output::new(value.into()));
    }

    /// Wait for every declaration and export, then report the outputs
    ///
    /// All registrations run to completion even when one fails; the first
    /// failure is returned.
    pub async fn finish(self) -> Result<PropertyMap> {
        let results = join_all(self.registrations.iter().map(Output::resolve)).await;
        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            return Err(DynamicError::from(err));
        }

        let mut outputs = PropertyMap::new();
        for (name, value) in &self.exports {
            let (value, secret) = value.resolve_with_secret().await?;
            if secret {
                outputs.insert_secret(name.clone(), value);
            } else {
                outputs.insert(name.clone(), value);
            }
        }

        self.monitor.register_outputs(outputs.clone()).await?;
        tracing::info!(
            stack = %self.stack,
            resources = self.registrations.len(),
            outputs = %outputs.redacted(),
            "Stack outputs registered"
        );
        Ok(outputs)
    }
}
