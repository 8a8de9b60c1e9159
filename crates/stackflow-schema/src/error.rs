//! SQL schema provider error types

use stackflow_dynamic::DynamicError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{0} client not found. Please install it and make sure it is on PATH")]
    ClientNotFound(String),

    #[error("{engine} script failed on {host} (exit {code}): {stderr}")]
    ScriptFailed {
        engine: String,
        host: String,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Input(#[from] DynamicError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    pub fn into_create_error(self) -> DynamicError {
        match self {
            SchemaError::Input(e) => e,
            other => DynamicError::CreateFailed(other.to_string()),
        }
    }

    pub fn into_delete_error(self) -> DynamicError {
        match self {
            SchemaError::Input(e) => e,
            other => DynamicError::DeleteFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
