//! Configuration for the Descope auth adapter.
//!
//! Settings are layered the same way for every entry point:
//!
//! 1. Built-in defaults
//! 2. TOML file (`descope-auth.toml`, or an explicit path)
//! 3. Environment overrides, e.g. `DESCOPE_AUTH__DESCOPE__PROJECT_ID=P2abc...`
//!
//! [`secrets`] provides AES-256-GCM sealing for secret values persisted to
//! disk by the file secret store.

pub mod app;
pub mod secrets;

pub use app::{
    AppConfig, DescopeSettings, HandlerSettings, LoggingConfig, ManagementSettings,
    RedeliverySettings, SecretsBackend, SecretsSettings, StateSettings, loader,
};
pub use secrets::{Keyring, SealedSecret};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encryption(msg: impl Into<String>) -> Self {
        Self::Encryption(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
