//! Secure configuration values
//!
//! Secure values are stored in the stack file as base64 of
//! `nonce (12 bytes) || AES-256-GCM ciphertext`. The key comes from
//! `STACKFLOW_SECRETS_KEY` (base64 of 32 bytes) and is never written to disk
//! by this crate.

use crate::error::{ConfigError, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Environment variable holding the base64 encoded secrets key
pub const SECRETS_KEY_ENV: &str = "STACKFLOW_SECRETS_KEY";

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// A configuration value that must not end up in logs
///
/// `Debug` and `Display` both print `[secret]`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Secret<U> {
        Secret(f(self.0))
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[secret]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[secret]")
    }
}

/// AES-256-GCM key for secure configuration values
#[derive(Clone)]
pub struct SecretsKey(Key<Aes256Gcm>);

impl fmt::Debug for SecretsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretsKey([secret])")
    }
}

impl SecretsKey {
    /// A fresh random key
    pub fn generate() -> Self {
        Self(Aes256Gcm::generate_key(OsRng))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let invalid = || ConfigError::InvalidValue {
            key: SECRETS_KEY_ENV.to_string(),
            expected: format!("base64 encoded {}-byte key", KEY_LEN),
        };

        let bytes = STANDARD.decode(encoded.trim()).map_err(|_| invalid())?;
        if bytes.len() != KEY_LEN {
            return Err(invalid());
        }
        Ok(Self(Key::<Aes256Gcm>::from_slice(&bytes).clone()))
    }

    /// Read the key from `STACKFLOW_SECRETS_KEY`, if set
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(SECRETS_KEY_ENV) {
            Ok(encoded) if !encoded.trim().is_empty() => Self::from_base64(&encoded).map(Some),
            _ => Ok(None),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.as_slice())
    }

    /// Encrypt `plaintext` with a random nonce
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new(&self.0);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| ConfigError::Encrypt(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(nonce.as_slice());
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    /// Decrypt the secure value stored under `key`
    pub fn decrypt(&self, key: &str, encoded: &str) -> Result<String> {
        let failed = |message: &str| ConfigError::Decrypt {
            key: key.to_string(),
            message: message.to_string(),
        };

        let payload = STANDARD
            .decode(encoded.trim())
            .map_err(|_| failed("value is not valid base64"))?;
        if payload.len() <= NONCE_LEN {
            return Err(failed("value is too short"));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = Aes256Gcm::new(&self.0)
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| failed("wrong key or corrupted value"))?;

        String::from_utf8(plaintext).map_err(|_| failed("plaintext is not UTF-8"))
    }
}

/// Encrypt a value with the key from `STACKFLOW_SECRETS_KEY`
pub fn encrypt_secret(plaintext: &str) -> Result<String> {
    let key = SecretsKey::from_env()?
        .ok_or_else(|| ConfigError::SecretsKeyMissing("<new value>".to_string()))?;
    key.encrypt(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_secret_is_redacted() {
        let password = Secret::new("hunter2".to_string());
        assert_eq!(format!("{}", password), "[secret]");
        assert_eq!(format!("{:?}", password), "[secret]");
        assert_eq!(password.expose(), "hunter2");
    }

    #[test]
    fn test_decrypt_recovers_plaintext() {
        let key = SecretsKey::generate();
        let encrypted = key.encrypt("s3cr3t").unwrap();

        assert_ne!(encrypted, "s3cr3t");
        assert_eq!(key.decrypt("votes:dbPassword", &encrypted).unwrap(), "s3cr3t");
    }

    #[test]
    fn test_nonce_is_fresh_per_value() {
        let key = SecretsKey::generate();
        assert_ne!(key.encrypt("same").unwrap(), key.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = SecretsKey::generate().encrypt("s3cr3t").unwrap();
        let err = SecretsKey::generate()
            .decrypt("votes:dbPassword", &encrypted)
            .unwrap_err();

        assert!(matches!(err, ConfigError::Decrypt { key, .. } if key == "votes:dbPassword"));
    }

    #[test]
    fn test_key_must_be_32_bytes() {
        let short = STANDARD.encode([0u8; 16]);
        assert!(SecretsKey::from_base64(&short).is_err());
        assert!(SecretsKey::from_base64("not base64!").is_err());

        let key = SecretsKey::generate();
        let restored = SecretsKey::from_base64(&key.to_base64()).unwrap();
        let encrypted = key.encrypt("x").unwrap();
        assert_eq!(restored.decrypt("k", &encrypted).unwrap(), "x");
    }

    #[test]
    #[serial]
    fn test_encrypt_secret_requires_env_key() {
        temp_env::with_var_unset(SECRETS_KEY_ENV, || {
            assert!(matches!(
                encrypt_secret("x"),
                Err(ConfigError::SecretsKeyMissing(_))
            ));
        });

        let key = SecretsKey::generate();
        temp_env::with_var(SECRETS_KEY_ENV, Some(key.to_base64()), || {
            let encrypted = encrypt_secret("x").unwrap();
            assert_eq!(key.decrypt("k", &encrypted).unwrap(), "x");
        });
    }
}
