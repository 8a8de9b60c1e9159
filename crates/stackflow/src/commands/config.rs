use anyhow::Context;
use clap::Args;
use colored::Colorize;
use stackflow_config::{Config, ConfigError, SecretsKey, StackFile};
use std::path::PathBuf;

/// Which stack file a config command works on
#[derive(Args, Debug, Clone)]
pub struct Scope {
    /// Stack name (selects Stack.<stack>.yaml)
    #[arg(short, long, default_value = "dev")]
    pub stack: String,
    /// Namespace for unqualified keys
    #[arg(short, long, default_value = "stackflow")]
    pub namespace: String,
    /// Explicit stack file, bypassing the lookup
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

impl Scope {
    /// Existing stack file, if any
    fn locate(&self) -> anyhow::Result<Option<PathBuf>> {
        if let Some(file) = &self.file {
            return Ok(file.exists().then(|| file.clone()));
        }
        match stackflow_config::find_stack_file(&self.stack) {
            Ok(path) => Ok(Some(path)),
            Err(ConfigError::StackFileNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> anyhow::Result<Config> {
        if let Some(file) = &self.file {
            if !file.exists() {
                anyhow::bail!("Stack file {} not found", file.display());
            }
        }
        let path = self
            .locate()?
            .ok_or_else(|| ConfigError::StackFileNotFound(self.stack.clone()))?;
        Ok(Config::from_file(self.namespace.clone(), &path)?)
    }
}

pub fn handle_get(scope: &Scope, key: &str, show_secrets: bool) -> anyhow::Result<()> {
    let config = scope.load()?;

    if config.is_secure(key) && !show_secrets {
        println!("[secret]");
        return Ok(());
    }

    let value = config.require(key)?;
    println!("{}", value);
    Ok(())
}

pub fn handle_set(scope: &Scope, key: &str, value: &str, secret: bool) -> anyhow::Result<()> {
    let path = match scope.locate()? {
        Some(path) => path,
        None => match &scope.file {
            Some(file) => file.clone(),
            None => stackflow_config::default_stack_file(&scope.stack)?,
        },
    };

    let file = if path.exists() {
        StackFile::load(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        StackFile::default()
    };

    let mut config = Config::from_stack_file(scope.namespace.clone(), file);
    if let Some(secrets_key) = SecretsKey::from_env()? {
        config = config.with_secrets_key(secrets_key);
    }

    if secret {
        config.set_secret(key, value)?;
    } else {
        config.set(key, value);
    }
    config.to_stack_file().save(&path)?;

    tracing::debug!(path = %path.display(), key = %config.full_key(key), "Saved configuration");
    println!(
        "{} {} {}",
        "✓".green(),
        config.full_key(key).bold(),
        format!("({})", path.display()).dimmed()
    );
    Ok(())
}

pub fn handle_list(scope: &Scope, show_secrets: bool) -> anyhow::Result<()> {
    let config = scope.load()?;

    for key in config.keys() {
        let value = if config.is_secure(key) && !show_secrets {
            "[secret]".dimmed().to_string()
        } else {
            config.get(key)?.unwrap_or_default()
        };
        println!("{}: {}", key.cyan(), value);
    }
    Ok(())
}
