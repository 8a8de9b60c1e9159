//! Provisioner error types

use stackflow_dynamic::DynamicError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("only SSH connection types currently supported")]
    UnsupportedConnection(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Connection to {host} failed: {message}")]
    ConnectionFailed { host: String, message: String },

    #[error("Authentication to {host} failed: {message}")]
    AuthFailed { host: String, message: String },

    #[error("Could not connect to {host} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        host: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Command exited with {code}")]
    CommandFailed { code: i32, stderr: String },

    #[error("Copy to {dest} failed: {message}")]
    CopyFailed { dest: String, message: String },

    #[error(transparent)]
    Input(#[from] DynamicError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Whether retrying the connection may help
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ProvisionError::ConnectionFailed { .. })
    }

    /// Map into the error reported for a failed create
    pub fn into_create_error(self) -> DynamicError {
        match self {
            ProvisionError::Input(e) => e,
            ProvisionError::RetryExhausted {
                attempts,
                last_error,
                ..
            } => DynamicError::RetryExhausted {
                attempts,
                last_error,
            },
            other => DynamicError::CreateFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
