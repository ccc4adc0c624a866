//! Secret indirection.
//!
//! A [`SecretRef`] names a value held by a secure store; it never carries the
//! plaintext. A [`SecretValue`] is the plaintext itself and only exists inside
//! the execution boundary that resolved it. It deliberately implements neither
//! `Serialize` nor a revealing `Debug`.

use serde::{Deserialize, Serialize};

use crate::error::{ProvisioningError, Result};

/// A named pointer into a secure secret store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef {
    parameter_name: String,
}

impl SecretRef {
    /// Wraps a parameter name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the name is empty or blank.
    pub fn bind(name: impl Into<String>) -> Result<Self> {
        let parameter_name = name.into();
        if parameter_name.trim().is_empty() {
            return Err(ProvisioningError::invalid_reference(
                "secret parameter name must not be empty",
            ));
        }
        Ok(Self { parameter_name })
    }

    pub fn name(&self) -> &str {
        &self.parameter_name
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.parameter_name)
    }
}

/// A resolved secret. Formatting never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plaintext. Call sites are the outbound request builder
    /// and the secret stores, nothing else.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}
