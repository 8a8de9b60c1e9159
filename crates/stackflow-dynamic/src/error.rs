//! Dynamic provider error types

use thiserror::Error;

/// Errors raised by providers, the provider host and the stack boundary
#[derive(Error, Debug)]
pub enum DynamicError {
    #[error("Provider not found for type: {0}")]
    ProviderNotFound(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid input '{key}': {message}")]
    InvalidInput { key: String, message: String },

    #[error("Create failed: {0}")]
    CreateFailed(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("Resource monitor error: {0}")]
    Monitor(String),

    #[error("Output unavailable: {0}")]
    OutputUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DynamicError {
    pub fn invalid_input(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DynamicError>;
