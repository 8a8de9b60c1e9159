use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Stack file for '{0}' not found. Checked:\n\
        - current directory: Stack.{0}.local.yaml, Stack.{0}.yaml\n\
        - ./.stackflow/ directory\n\
        - ~/.config/stackflow/Stack.{0}.yaml\n\
        Set STACKFLOW_CONFIG_PATH to point at a file directly"
    )]
    StackFileNotFound(String),

    #[error("Missing required configuration variable '{0}'")]
    MissingKey(String),

    #[error("Configuration variable '{key}' is not a valid {expected}")]
    InvalidValue { key: String, expected: String },

    #[error("Configuration variable '{0}' is secure but STACKFLOW_SECRETS_KEY is not set")]
    SecretsKeyMissing(String),

    #[error("Failed to encrypt value: {0}")]
    Encrypt(String),

    #[error("Failed to decrypt '{key}': {message}")]
    Decrypt { key: String, message: String },

    #[error("No TLD found on {0}")]
    NoTopLevelDomain(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
