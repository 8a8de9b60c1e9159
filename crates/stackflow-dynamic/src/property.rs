//! Property maps carrying resource inputs and outputs
//!
//! A [`PropertyMap`] is a JSON object plus the set of keys whose values are
//! secret. Secret values travel to the engine untouched (it owns encryption
//! at rest) but are replaced with [`REDACTED`] in every rendering meant for
//! humans: `Debug`, [`PropertyMap::redacted`] and log fields.

use crate::error::{DynamicError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Placeholder rendered in place of secret values
pub const REDACTED: &str = "[secret]";

/// Named resource properties with secret tracking
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMap {
    /// Property values
    #[serde(default)]
    values: Map<String, Value>,

    /// Keys whose values must never be logged
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    secrets: BTreeSet<String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self {
                values,
                secrets: BTreeSet::new(),
            }),
            other => Err(DynamicError::invalid_input(
                "<properties>",
                format!("expected a JSON object, got {}", type_name(&other)),
            )),
        }
    }

    /// Build from any serializable struct
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Self::from_value(serde_json::to_value(value)?)
    }

    /// Deserialize the whole map into a typed input struct
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| DynamicError::invalid_input("<properties>", e.to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.secrets.remove(&key);
        self.values.insert(key, value.into());
    }

    pub fn insert_secret(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.values.insert(key.clone(), value.into());
        self.secrets.insert(key);
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_secret(key, value);
        self
    }

    /// Mark an existing key as secret. Unknown keys are ignored.
    pub fn mark_secret(&mut self, key: &str) {
        if self.values.contains_key(key) {
            self.secrets.insert(key.to_string());
        }
    }

    /// Carry secret marks over from `source` for every key present here
    pub fn inherit_secrets(&mut self, source: &PropertyMap) {
        for key in &source.secrets {
            self.mark_secret(key);
        }
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.secrets.contains(key)
    }

    pub fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }

    pub fn secret_keys(&self) -> impl Iterator<Item = &str> {
        self.secrets.iter().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Get a required string input
    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.values.get(key) {
            None | Some(Value::Null) => Err(DynamicError::MissingInput(key.to_string())),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(DynamicError::invalid_input(
                key,
                format!("expected a string, got {}", type_name(other)),
            )),
        }
    }

    /// Get a value as a specific type
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a required value as a specific type
    pub fn require_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = match self.values.get(key) {
            None | Some(Value::Null) => return Err(DynamicError::MissingInput(key.to_string())),
            Some(v) => v,
        };
        serde_json::from_value(value.clone())
            .map_err(|e| DynamicError::invalid_input(key, e.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.secrets.remove(key);
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Property values without secret marks
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Plain JSON object, secrets included
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// JSON object with secret values replaced by [`REDACTED`]
    pub fn redacted(&self) -> Value {
        let values = self
            .values
            .iter()
            .map(|(k, v)| {
                if self.secrets.contains(k) {
                    (k.clone(), Value::String(REDACTED.to_string()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        Value::Object(values)
    }
}

impl fmt::Debug for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyMap({})", self.redacted())
    }
}

impl From<Map<String, Value>> for PropertyMap {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            secrets: BTreeSet::new(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
