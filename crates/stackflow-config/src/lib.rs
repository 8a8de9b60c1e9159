//! StackFlow stack configuration
//!
//! Flat `namespace:key` settings per stack, with encrypted secure values.

pub mod config;
pub mod domain;
pub mod error;
pub mod secret;

pub use config::{Config, ConfigValue, StackFile};
pub use domain::{DomainParts, split_domain};
pub use error::*;
pub use secret::{SECRETS_KEY_ENV, Secret, SecretsKey, encrypt_secret};

use std::path::PathBuf;

/// Environment variable pointing directly at a stack file
pub const CONFIG_PATH_ENV: &str = "STACKFLOW_CONFIG_PATH";

/// Candidate file names for `stack`, highest priority first
fn candidates(stack: &str) -> [String; 2] {
    [
        format!("Stack.{}.local.yaml", stack),
        format!("Stack.{}.yaml", stack),
    ]
}

/// Find the stack file for `stack`
///
/// Lookup order:
/// 1. `STACKFLOW_CONFIG_PATH` (direct path)
/// 2. Current directory: `Stack.<stack>.local.yaml`, `Stack.<stack>.yaml`
/// 3. `./.stackflow/`: same order
/// 4. `~/.config/stackflow/Stack.<stack>.yaml` (global)
pub fn find_stack_file(stack: &str) -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;
    let candidates = candidates(stack);

    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let stack_dir = current_dir.join(".stackflow");
    if stack_dir.is_dir() {
        for filename in &candidates {
            let path = stack_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir
            .join("stackflow")
            .join(format!("Stack.{}.yaml", stack));
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound(stack.to_string()))
}

/// Where `stackflow config set` writes when no stack file exists yet
pub fn default_stack_file(stack: &str) -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(format!("Stack.{}.yaml", stack)))
}
