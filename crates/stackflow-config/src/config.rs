//! Stack configuration: the `config:` section of a stack file
//!
//! ```yaml
//! config:
//!   votes:dbName: votes
//!   votes:dbPassword:
//!     secure: 9xQ0...
//! ```

use crate::error::{ConfigError, Result};
use crate::secret::{Secret, SecretsKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A single configuration value as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Encrypted value, see [`SecretsKey`]
    Secure { secure: String },
    Plain(serde_yaml::Value),
}

impl ConfigValue {
    pub fn is_secure(&self) -> bool {
        matches!(self, ConfigValue::Secure { .. })
    }
}

/// On-disk layout of `Stack.<stack>.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFile {
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,
}

impl StackFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// Configuration of one stack, scoped to a namespace
///
/// Built once at program entry and passed to whatever needs it. Keys without
/// a `:` are qualified with the namespace, so `dbName` reads `votes:dbName`.
#[derive(Debug, Clone)]
pub struct Config {
    namespace: String,
    values: BTreeMap<String, ConfigValue>,
    secrets_key: Option<SecretsKey>,
}

impl Config {
    /// Empty configuration
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            values: BTreeMap::new(),
            secrets_key: None,
        }
    }

    /// Configuration of `stack`, located with [`crate::find_stack_file`]
    ///
    /// The secrets key is read from `STACKFLOW_SECRETS_KEY` if set.
    pub fn load(namespace: impl Into<String>, stack: &str) -> Result<Self> {
        let path = crate::find_stack_file(stack)?;
        Self::from_file(namespace, &path)
    }

    pub fn from_file(namespace: impl Into<String>, path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading stack configuration");
        let file = StackFile::load(path)?;
        Ok(Self::from_stack_file(namespace, file).with_optional_key(SecretsKey::from_env()?))
    }

    pub fn from_stack_file(namespace: impl Into<String>, file: StackFile) -> Self {
        Self {
            namespace: namespace.into(),
            values: file.config,
            secrets_key: None,
        }
    }

    pub fn with_secrets_key(mut self, key: SecretsKey) -> Self {
        self.secrets_key = Some(key);
        self
    }

    fn with_optional_key(mut self, key: Option<SecretsKey>) -> Self {
        self.secrets_key = key;
        self
    }

    /// Set a plain value
    pub fn with_value(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified key: `namespace:key` unless `key` already has a namespace
    pub fn full_key(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }

    /// Qualified keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_secure(&self, key: &str) -> bool {
        self.values
            .get(&self.full_key(key))
            .is_some_and(ConfigValue::is_secure)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(
            self.full_key(key),
            ConfigValue::Plain(serde_yaml::Value::String(value.into())),
        );
    }

    /// Encrypt and store a value; requires a secrets key
    pub fn set_secret(&mut self, key: &str, value: &str) -> Result<()> {
        let full_key = self.full_key(key);
        let secrets_key = self
            .secrets_key
            .as_ref()
            .ok_or_else(|| ConfigError::SecretsKeyMissing(full_key.clone()))?;
        let secure = secrets_key.encrypt(value)?;
        self.values.insert(full_key, ConfigValue::Secure { secure });
        Ok(())
    }

    pub fn to_stack_file(&self) -> StackFile {
        StackFile {
            config: self.values.clone(),
        }
    }

    /// Optional value; secure values are decrypted
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.full_key(key);
        let Some(value) = self.values.get(&full_key) else {
            return Ok(None);
        };

        match value {
            ConfigValue::Secure { secure } => {
                let secrets_key = self
                    .secrets_key
                    .as_ref()
                    .ok_or_else(|| ConfigError::SecretsKeyMissing(full_key.clone()))?;
                secrets_key.decrypt(&full_key, secure).map(Some)
            }
            ConfigValue::Plain(plain) => Ok(scalar_to_string(plain)),
        }
    }

    /// Required value; missing keys are a configuration error
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)?
            .ok_or_else(|| ConfigError::MissingKey(self.full_key(key)))
    }

    pub fn get_secret(&self, key: &str) -> Result<Option<Secret<String>>> {
        Ok(self.get(key)?.map(Secret::new))
    }

    /// Required value wrapped so it cannot be logged by accident
    pub fn require_secret(&self, key: &str) -> Result<Secret<String>> {
        self.require(key).map(Secret::new)
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get_parsed(key, "boolean")
    }

    pub fn require_bool(&self, key: &str) -> Result<bool> {
        self.get_bool(key)?
            .ok_or_else(|| ConfigError::MissingKey(self.full_key(key)))
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.get_parsed(key, "integer")
    }

    pub fn require_int(&self, key: &str) -> Result<i64> {
        self.get_int(key)?
            .ok_or_else(|| ConfigError::MissingKey(self.full_key(key)))
    }

    /// Structured value (a YAML map or list) deserialized into `T`
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.full_key(key);
        match self.values.get(&full_key) {
            None => Ok(None),
            Some(ConfigValue::Plain(plain)) => serde_yaml::from_value(plain.clone())
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: full_key,
                    expected: std::any::type_name::<T>().to_string(),
                }),
            Some(ConfigValue::Secure { .. }) => {
                let decrypted = self.require(key)?;
                serde_yaml::from_str(&decrypted)
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidValue {
                        key: full_key,
                        expected: std::any::type_name::<T>().to_string(),
                    })
            }
        }
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, expected: &str) -> Result<Option<T>> {
        match self.get(key)? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: self.full_key(key),
                    expected: expected.to_string(),
                }),
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}
