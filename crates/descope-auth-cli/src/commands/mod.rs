pub mod adapter;
pub mod secrets;
pub mod users;

use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use descope_auth_config::AppConfig;
use descope_auth_provisioning::{DescopeAuth, DescopeAuthBuilder, ManagementAccess};

/// Construct the adapter from configuration. Replays the default machine
/// client when the state file already records it.
pub async fn build_adapter(config: &AppConfig) -> Result<DescopeAuth> {
    let builder = DescopeAuthBuilder::from_config(config).context("Failed to wire the adapter")?;
    builder.build().await.context("Failed to construct the adapter")
}

/// Reach the management API without provisioning the default machine client.
pub async fn connect_management(config: &AppConfig) -> Result<ManagementAccess> {
    let builder = DescopeAuthBuilder::from_config(config).context("Failed to wire the adapter")?;
    builder
        .management_access()
        .await
        .context("Failed to reach the management API")
}

/// Read a file, or stdin when `source` is `-`.
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(source).with_context(|| format!("Failed to read file: {source}"))
    }
}
