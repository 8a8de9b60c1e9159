//! In-memory resource monitor for unit tests of stack programs

use crate::error::{DynamicError, Result};
use crate::property::PropertyMap;
use crate::stack::{RegisterResourceRequest, RegisterResourceResponse, ResourceMonitor};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Records every registration and echoes inputs back as outputs
///
/// The assigned id is `<name>_id`. Registrations of a type added with
/// [`MockMonitor::failing_on`] fail with [`DynamicError::Monitor`].
#[derive(Debug, Default)]
pub struct MockMonitor {
    registrations: Mutex<Vec<RegisterResourceRequest>>,
    stack_outputs: Mutex<Option<PropertyMap>>,
    failing_types: HashSet<String>,
}

impl MockMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, type_token: impl Into<String>) -> Self {
        self.failing_types.insert(type_token.into());
        self
    }

    /// Registrations in the order they reached the monitor
    pub fn registrations(&self) -> Vec<RegisterResourceRequest> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, name: &str) -> Option<RegisterResourceRequest> {
        self.registrations().into_iter().find(|r| r.name == name)
    }

    /// Outputs passed to `register_outputs`, if it was called
    pub fn stack_outputs(&self) -> Option<PropertyMap> {
        self.stack_outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ResourceMonitor for MockMonitor {
    async fn register_resource(
        &self,
        request: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse> {
        if self.failing_types.contains(&request.type_token) {
            return Err(DynamicError::Monitor(format!(
                "registration of {} rejected",
                request.urn
            )));
        }

        let response = RegisterResourceResponse {
            urn: request.urn.clone(),
            id: format!("{}_id", request.name),
            outputs: request.inputs.clone(),
        };
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(response)
    }

    async fn register_outputs(&self, outputs: PropertyMap) -> Result<()> {
        *self
            .stack_outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outputs);
        Ok(())
    }
}
