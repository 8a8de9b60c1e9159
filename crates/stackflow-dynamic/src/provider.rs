//! Dynamic resource provider trait definition

use crate::diff::{DiffPolicy, DiffResult};
use crate::error::Result;
use crate::property::PropertyMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dynamic resource provider abstraction trait
///
/// Every custom resource (SQL schema, copied file, remote command) implements
/// this trait to bridge its side effect into the engine's lifecycle. The engine
/// guarantees at most one call in flight per resource, so implementations keep
/// no locks of their own.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns the type token (e.g., "stackflow:schema:Schema")
    fn type_token(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str {
        self.type_token()
    }

    /// Replacement policy used by the default [`ResourceProvider::diff`]
    fn diff_policy(&self) -> DiffPolicy {
        DiffPolicy::replace_any()
    }

    /// Whether a failed delete aborts the engine step or only warns
    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Strict
    }

    /// Perform the side effect and assign a fresh identity
    async fn create(&self, inputs: &PropertyMap) -> Result<CreateResult>;

    /// Refresh the stored state. No provider in this workspace reads back
    /// remote state, so the default echoes what the engine stored.
    async fn read(&self, id: &ResourceId, state: &PropertyMap) -> Result<ReadResult> {
        Ok(ReadResult {
            id: id.clone(),
            outs: state.clone(),
        })
    }

    /// Compare old and new inputs
    async fn diff(
        &self,
        _id: &ResourceId,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<DiffResult> {
        Ok(self.diff_policy().diff(olds, news))
    }

    /// Reconcile a non-replacing change. The default re-adopts the new inputs.
    async fn update(
        &self,
        _id: &ResourceId,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<UpdateResult> {
        Ok(UpdateResult { outs: news.clone() })
    }

    /// Reverse the side effect using the stored inputs
    async fn delete(&self, id: &ResourceId, inputs: &PropertyMap) -> Result<()>;
}

/// How delete failures are reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// A failed delete fails the engine step
    Strict,
    /// A failed delete is reported as a warning; cleanup is not guaranteed
    BestEffort,
}

/// Opaque resource identity assigned by a provider at creation time
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `prefix` followed by 32 lowercase hex characters
    pub fn random_hex(prefix: &str) -> Self {
        Self(format!("{}{}", prefix, Uuid::new_v4().simple()))
    }

    /// A v4 UUID rendered as 32 hex characters without hyphens
    pub fn uuid() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResult {
    pub id: ResourceId,
    pub outs: PropertyMap,
}

/// Result of a read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    pub id: ResourceId,
    pub outs: PropertyMap,
}

/// Result of an in-place update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub outs: PropertyMap,
}
