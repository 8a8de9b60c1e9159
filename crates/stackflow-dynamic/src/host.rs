//! Provider host: dispatches lifecycle requests to registered providers
//!
//! The engine talks to the host with newline-delimited JSON, one request per
//! line and one response per line:
//!
//! ```text
//! {"method":"create","type_token":"stackflow:schema:Schema","inputs":{"values":{..}}}
//! {"result":"create","id":"schema-3f0c..","outs":{"values":{..}}}
//! ```

use crate::diff::DiffResult;
use crate::error::{DynamicError, Result};
use crate::property::PropertyMap;
use crate::provider::{
    CreateResult, DeletePolicy, ReadResult, ResourceId, ResourceProvider, UpdateResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// A lifecycle call from the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LifecycleRequest {
    Create {
        type_token: String,
        inputs: PropertyMap,
    },
    Read {
        type_token: String,
        id: ResourceId,
        state: PropertyMap,
    },
    Diff {
        type_token: String,
        id: ResourceId,
        olds: PropertyMap,
        news: PropertyMap,
    },
    Update {
        type_token: String,
        id: ResourceId,
        olds: PropertyMap,
        news: PropertyMap,
    },
    Delete {
        type_token: String,
        id: ResourceId,
        inputs: PropertyMap,
    },
}

impl LifecycleRequest {
    pub fn type_token(&self) -> &str {
        match self {
            LifecycleRequest::Create { type_token, .. }
            | LifecycleRequest::Read { type_token, .. }
            | LifecycleRequest::Diff { type_token, .. }
            | LifecycleRequest::Update { type_token, .. }
            | LifecycleRequest::Delete { type_token, .. } => type_token,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            LifecycleRequest::Create { .. } => "create",
            LifecycleRequest::Read { .. } => "read",
            LifecycleRequest::Diff { .. } => "diff",
            LifecycleRequest::Update { .. } => "update",
            LifecycleRequest::Delete { .. } => "delete",
        }
    }
}

/// The host's answer to a [`LifecycleRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LifecycleResponse {
    Create(CreateResult),
    Read(ReadResult),
    Diff(DiffResult),
    Update(UpdateResult),
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Error {
        message: String,
    },
}

impl LifecycleResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, LifecycleResponse::Error { .. })
    }
}

/// Registry of providers keyed by type token
#[derive(Default, Clone)]
pub struct ProviderHost {
    providers: BTreeMap<String, Arc<dyn ResourceProvider>>,
}

impl ProviderHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its type token, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn ResourceProvider>) {
        let token = provider.type_token().to_string();
        tracing::debug!(type_token = %token, "Registering provider");
        self.providers.insert(token, provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn provider(&self, type_token: &str) -> Result<&Arc<dyn ResourceProvider>> {
        self.providers
            .get(type_token)
            .ok_or_else(|| DynamicError::ProviderNotFound(type_token.to_string()))
    }

    pub fn type_tokens(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn ResourceProvider>> {
        self.providers.values()
    }

    /// Run a request against its provider
    pub async fn dispatch(&self, request: LifecycleRequest) -> Result<LifecycleResponse> {
        let provider = self.provider(request.type_token())?;

        match request {
            LifecycleRequest::Create { inputs, .. } => {
                let mut result = provider.create(&inputs).await?;
                result.outs.inherit_secrets(&inputs);
                tracing::info!(
                    provider = provider.display_name(),
                    id = %result.id,
                    "Created resource"
                );
                Ok(LifecycleResponse::Create(result))
            }
            LifecycleRequest::Read { id, state, .. } => {
                let mut result = provider.read(&id, &state).await?;
                result.outs.inherit_secrets(&state);
                Ok(LifecycleResponse::Read(result))
            }
            LifecycleRequest::Diff { id, olds, news, .. } => {
                let result = provider.diff(&id, &olds, &news).await?;
                tracing::info!(
                    provider = provider.display_name(),
                    id = %id,
                    step = %result.step(),
                    replaces = ?result.replaces,
                    "Diffed resource"
                );
                Ok(LifecycleResponse::Diff(result))
            }
            LifecycleRequest::Update { id, olds, news, .. } => {
                let mut result = provider.update(&id, &olds, &news).await?;
                result.outs.inherit_secrets(&news);
                tracing::info!(
                    provider = provider.display_name(),
                    id = %id,
                    "Updated resource"
                );
                Ok(LifecycleResponse::Update(result))
            }
            LifecycleRequest::Delete { id, inputs, .. } => {
                match provider.delete(&id, &inputs).await {
                    Ok(()) => {
                        tracing::info!(
                            provider = provider.display_name(),
                            id = %id,
                            "Deleted resource"
                        );
                        Ok(LifecycleResponse::Delete { warning: None })
                    }
                    Err(e) if provider.delete_policy() == DeletePolicy::BestEffort => {
                        tracing::warn!(
                            provider = provider.display_name(),
                            id = %id,
                            error = %e,
                            "Best-effort delete failed"
                        );
                        Ok(LifecycleResponse::Delete {
                            warning: Some(e.to_string()),
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Like [`ProviderHost::dispatch`], with failures turned into an error response
    pub async fn handle(&self, request: LifecycleRequest) -> LifecycleResponse {
        let method = request.method();
        let type_token = request.type_token().to_string();

        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(method, type_token = %type_token, error = %e, "Lifecycle call failed");
                LifecycleResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Handle one raw request line
    pub async fn handle_line(&self, line: &str) -> LifecycleResponse {
        match serde_json::from_str::<LifecycleRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed lifecycle request");
                LifecycleResponse::Error {
                    message: format!("malformed request: {}", e),
                }
            }
        }
    }
}

/// Serve lifecycle requests until `reader` reaches EOF
///
/// Requests are handled one at a time, in order. Blank lines are skipped; a
/// line that is not UTF-8 gets an error response like any malformed request.
pub async fn serve<R, W>(host: &ProviderHost, mut reader: R, mut writer: W) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut handled = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                host.handle_line(line).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lifecycle request is not UTF-8");
                LifecycleResponse::Error {
                    message: format!("malformed request: {}", e),
                }
            }
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        handled += 1;
    }

    tracing::debug!(handled, "Lifecycle input closed");
    Ok(handled)
}
