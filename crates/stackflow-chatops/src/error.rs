use stackflow_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatOpsError {
    #[error("{0} was not provided")]
    MissingConfig(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("Event handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ChatOpsError>;
