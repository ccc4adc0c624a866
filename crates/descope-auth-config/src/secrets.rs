//! Secret sealing using AES-256-GCM
//!
//! Secrets written to disk (the management key imported by an operator and
//! client secrets issued during provisioning) are sealed with a key taken
//! from the environment.

use std::collections::HashMap;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use descope_auth_core::SecretValue;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

/// A sealed secret as persisted on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    /// Base64-encoded ciphertext
    pub ciphertext: String,
    /// Base64-encoded nonce
    pub nonce: String,
    /// Key identifier for key rotation support
    pub key_id: String,
}

impl SealedSecret {
    /// Seal a plaintext value
    pub fn seal(
        plaintext: &SecretValue,
        key: &[u8; KEY_SIZE],
        key_id: &str,
    ) -> Result<Self, ConfigError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| ConfigError::encryption(format!("Failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.expose().as_bytes())
            .map_err(|e| ConfigError::encryption(format!("Encryption failed: {e}")))?;

        Ok(Self {
            ciphertext: BASE64.encode(&ciphertext),
            nonce: BASE64.encode(nonce_bytes),
            key_id: key_id.to_string(),
        })
    }

    /// Open the sealed value
    pub fn open(&self, key: &[u8; KEY_SIZE]) -> Result<SecretValue, ConfigError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| ConfigError::encryption(format!("Failed to create cipher: {e}")))?;

        let ciphertext = BASE64
            .decode(&self.ciphertext)
            .map_err(|e| ConfigError::encryption(format!("Invalid ciphertext base64: {e}")))?;

        let nonce_bytes = BASE64
            .decode(&self.nonce)
            .map_err(|e| ConfigError::encryption(format!("Invalid nonce base64: {e}")))?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(ConfigError::encryption("Invalid nonce size"));
        }

        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| ConfigError::encryption(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map(SecretValue::new)
            .map_err(|e| ConfigError::encryption(format!("Invalid UTF-8 in decrypted value: {e}")))
    }
}

/// Sealing keys by id; new secrets are sealed with the current key.
#[derive(Clone)]
pub struct Keyring {
    current_key_id: String,
    keys: HashMap<String, [u8; KEY_SIZE]>,
}

impl Keyring {
    /// Build a keyring from the named environment variable.
    ///
    /// Returns `Ok(None)` when the variable is not set.
    pub fn from_env(var: &str) -> Result<Option<Self>, ConfigError> {
        match std::env::var(var) {
            Ok(key_str) => {
                let key = Self::parse_key(&key_str)?;
                Ok(Some(Self::new(key, "primary")))
            }
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::encryption(format!("Failed to read {var}: {e}"))),
        }
    }

    pub fn new(key: [u8; KEY_SIZE], key_id: &str) -> Self {
        let mut keys = HashMap::new();
        keys.insert(key_id.to_string(), key);
        Self {
            current_key_id: key_id.to_string(),
            keys,
        }
    }

    /// Parse a key from a hex or base64 string
    pub fn parse_key(key_str: &str) -> Result<[u8; KEY_SIZE], ConfigError> {
        let key_str = key_str.trim();

        if key_str.len() == KEY_SIZE * 2
            && let Ok(bytes) = hex::decode(key_str)
        {
            let mut key = [0u8; KEY_SIZE];
            key.copy_from_slice(&bytes);
            return Ok(key);
        }

        let bytes = BASE64
            .decode(key_str)
            .map_err(|e| ConfigError::encryption(format!("Invalid base64 key: {e}")))?;

        if bytes.len() != KEY_SIZE {
            return Err(ConfigError::encryption(format!(
                "Key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(key)
    }

    /// Generate a new random key
    pub fn generate_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    pub fn current_key_id(&self) -> &str {
        &self.current_key_id
    }

    /// Add an older key so values sealed with it can still be opened
    pub fn add_key(&mut self, key: [u8; KEY_SIZE], key_id: &str) {
        self.keys.insert(key_id.to_string(), key);
    }

    pub fn seal(&self, value: &SecretValue) -> Result<SealedSecret, ConfigError> {
        let key = self.keys.get(&self.current_key_id).ok_or_else(|| {
            ConfigError::encryption(format!("Current key '{}' not found", self.current_key_id))
        })?;
        SealedSecret::seal(value, key, &self.current_key_id)
    }

    pub fn open(&self, sealed: &SealedSecret) -> Result<SecretValue, ConfigError> {
        let key = self.keys.get(&sealed.key_id).ok_or_else(|| {
            ConfigError::encryption(format!("Key '{}' not found in keyring", sealed.key_id))
        })?;
        sealed.open(key)
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("current_key_id", &self.current_key_id)
            .field("keys", &"<redacted>")
            .finish()
    }
}
