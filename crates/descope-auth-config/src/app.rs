use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use descope_auth_core::{DomainSettings, is_well_formed_domain};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Construction parameters of the adapter
    #[serde(default)]
    pub descope: DescopeSettings,
    /// Host naming for base URL derivation
    #[serde(default)]
    pub domain: DomainSettings,
    #[serde(default)]
    pub management: ManagementSettings,
    #[serde(default)]
    pub secrets: SecretsSettings,
    /// Durable physical-id store
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub handler: HandlerSettings,
    #[serde(default)]
    pub redelivery: RedeliverySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.descope.project_id.trim().is_empty() {
            return Err(ConfigError::validation("descope.project_id must not be empty"));
        }
        if let Some(domain) = &self.descope.domain
            && !is_well_formed_domain(domain)
        {
            return Err(ConfigError::validation(
                "descope.domain must start with https:// and must not end with '/'",
            ));
        }
        if self.descope.client_secret_parameter_name.trim().is_empty() {
            return Err(ConfigError::validation(
                "descope.client_secret_parameter_name must not be empty",
            ));
        }
        url::Url::parse(&self.descope.control_plane_callback_url).map_err(|e| {
            ConfigError::validation(format!("descope.control_plane_callback_url: {e}"))
        })?;
        if self.domain.url_prefix.is_empty() || self.domain.domain_suffix.is_empty() {
            return Err(ConfigError::validation(
                "domain.url_prefix and domain.domain_suffix must not be empty",
            ));
        }
        if self.management.request_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "management.request_timeout_ms must be > 0",
            ));
        }
        if self.management.max_response_size == 0 {
            return Err(ConfigError::validation(
                "management.max_response_size must be > 0",
            ));
        }
        if self.handler.identity.trim().is_empty() {
            return Err(ConfigError::validation("handler.identity must not be empty"));
        }
        if self.redelivery.max_attempts == 0 {
            return Err(ConfigError::validation("redelivery.max_attempts must be > 0"));
        }
        if self.redelivery.multiplier < 1.0 {
            return Err(ConfigError::validation("redelivery.multiplier must be >= 1.0"));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::parse(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescopeSettings {
    /// Descope project id
    #[serde(default)]
    pub project_id: String,
    /// Management API base URL override
    #[serde(default)]
    pub domain: Option<String>,
    /// Name of the secret parameter holding the management key
    #[serde(default)]
    pub client_secret_parameter_name: String,
    #[serde(default = "default_callback_url")]
    pub control_plane_callback_url: String,
    /// Whether API gateway routes validate scopes
    #[serde(default = "default_true")]
    pub set_api_gw_scopes: bool,
}

fn default_callback_url() -> String {
    "http://localhost".into()
}
fn default_true() -> bool {
    true
}

impl Default for DescopeSettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            domain: None,
            client_secret_parameter_name: String::new(),
            control_plane_callback_url: default_callback_url(),
            set_api_gw_scopes: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementSettings {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_response_size() -> usize {
    1024 * 1024
}

impl Default for ManagementSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_response_size: default_max_response_size(),
        }
    }
}

impl ManagementSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretsBackend {
    /// Encrypted JSON file
    #[default]
    File,
    /// AWS Parameters and Secrets extension (read-only)
    Extension,
}

impl std::fmt::Display for SecretsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretsBackend::File => write!(f, "file"),
            SecretsBackend::Extension => write!(f, "extension"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsSettings {
    /// Where the management key is read from
    #[serde(default)]
    pub backend: SecretsBackend,
    /// Encrypted file store; also receives issued client secrets
    #[serde(default = "default_secrets_path")]
    pub path: PathBuf,
    /// Environment variable holding the 32-byte sealing key (hex or base64)
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_extension_port")]
    pub extension_port: u16,
    #[serde(default = "default_session_token_env")]
    pub session_token_env: String,
    /// Prefix for references to issued secrets
    #[serde(default = "default_vault_prefix")]
    pub vault_prefix: String,
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from(".descope-auth/secrets.json")
}
fn default_key_env() -> String {
    "DESCOPE_AUTH_SECRETS_KEY".into()
}
fn default_extension_port() -> u16 {
    2773
}
fn default_session_token_env() -> String {
    "AWS_SESSION_TOKEN".into()
}
fn default_vault_prefix() -> String {
    "/descope-auth".into()
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            backend: SecretsBackend::default(),
            path: default_secrets_path(),
            key_env: default_key_env(),
            extension_port: default_extension_port(),
            session_token_env: default_session_token_env(),
            vault_prefix: default_vault_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".descope-auth/resources.json")
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Execution settings of the provisioning handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerSettings {
    /// Identity the management key read grant is issued to
    #[serde(default = "default_handler_identity")]
    pub identity: String,
    /// Region -> secrets extension layer, injected at startup
    #[serde(default)]
    pub extension_layers: BTreeMap<String, String>,
}

fn default_handler_identity() -> String {
    "descope-provisioning-handler".into()
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            identity: default_handler_identity(),
            extension_layers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeliverySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RedeliverySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use crate::ConfigError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "descope-auth.toml";

    /// Load configuration from an optional TOML file plus environment overrides.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let cfg = load_unvalidated(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Same as [`load_config`] without validation, for commands that only
    /// need part of the configuration.
    pub fn load_unvalidated(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(ConfigError::validation(format!(
                        "config file not found: {p}"
                    )));
                }
                builder = builder.add_source(File::from(pathbuf));
                tracing::debug!(path = p, "loading configuration file");
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    tracing::debug!(path = DEFAULT_CONFIG_FILE, "loading configuration file");
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., DESCOPE_AUTH__DESCOPE__PROJECT_ID=P2abc
        builder = builder.add_source(
            Environment::with_prefix("DESCOPE_AUTH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::parse(format!("config build error: {e}")))?;
        cfg.try_deserialize()
            .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.descope.project_id = "P1234567890123456789012345678901".into();
        cfg.descope.client_secret_parameter_name = "/sbt/descope/mgmt-key".into();
        cfg
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.descope.control_plane_callback_url, "http://localhost");
        assert!(cfg.descope.set_api_gw_scopes);
        assert_eq!(cfg.management.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.secrets.backend, SecretsBackend::File);
        assert_eq!(cfg.secrets.extension_port, 2773);
        assert_eq!(cfg.handler.identity, "descope-provisioning-handler");
        assert!(cfg.handler.extension_layers.is_empty());
        assert_eq!(cfg.domain, DomainSettings::default());
    }

    #[test]
    fn test_validation() {
        assert!(valid().validate().is_ok());
        assert!(AppConfig::default().validate().is_err());

        let mut cfg = valid();
        cfg.descope.domain = Some("https://example.com/".into());
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.descope.client_secret_parameter_name = " ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.descope.control_plane_callback_url = "not a url".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.redelivery.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_layers() {
        let mut cfg = valid();
        cfg.handler
            .extension_layers
            .insert("us-east-1".into(), "arn:aws:lambda:us-east-1:1:layer:x:11".into());
        let text = cfg.to_toml_string().unwrap();
        assert!(text.contains("us-east-1"));
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.handler.extension_layers.len(), 1);
    }
}
