//! StackFlow Dynamic Providers
//!
//! This crate provides the contract custom resources implement to take part
//! in a declarative provisioning run, and the boundary through which
//! programs declare resources to the orchestration engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              orchestration engine               │
//! │        (plan, diff, state, parallelism)         │
//! └───────┬─────────────────────────────▲───────────┘
//!         │ lifecycle requests          │ register_resource
//!         │ (NDJSON over stdio)         │ register_outputs
//! ┌───────▼───────────────────┐ ┌───────┴───────────┐
//! │       ProviderHost        │ │       Stack       │
//! │  trait ResourceProvider   │ │  declare/export   │
//! │  DiffPolicy, retry        │ │  Output<T>        │
//! └───────┬───────────────────┘ └───────────────────┘
//!         │
//! ┌───────▼───────┐ ┌───────────────┐
//! │  provisioners │ │    schema     │
//! │ CopyFile/Exec │ │  MySQL / PG   │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! # Extension points
//!
//! Providers living outside this workspace implement [`ResourceProvider`] and
//! are added with [`ProviderHost::register`]. A provider whose cleanup is
//! optional (cache entries, records owned by another system) declares
//! [`DeletePolicy::BestEffort`]; the host then answers a failed delete with a
//! `warning` instead of an error. The built-in providers are all strict.

pub mod diff;
pub mod error;
pub mod host;
pub mod mocks;
pub mod output;
pub mod property;
pub mod provider;
pub mod retry;
pub mod stack;

// Re-exports
pub use diff::{DiffPolicy, DiffResult, StepKind, changed_keys};
pub use error::{DynamicError, Result};
pub use host::{LifecycleRequest, LifecycleResponse, ProviderHost, serve};
pub use output::{Output, OutputError};
pub use property::{PropertyMap, REDACTED};
pub use provider::{
    CreateResult, DeletePolicy, ReadResult, ResourceId, ResourceProvider, UpdateResult,
};
pub use retry::{RetryConfig, RetryError, retry};
pub use stack::{
    Input, RegisterResourceRequest, RegisterResourceResponse, ResourceArgs, ResourceHandle,
    ResourceMonitor, ResourceOptions, Stack,
};
