use anyhow::{Context, Result};
use colored::Colorize;
use descope_auth_config::AppConfig;
use descope_auth_core::{SecretRef, SecretValue};
use descope_auth_provisioning::{FileSecretStore, SecretStore};

use super::read_input;
use crate::output::print_success;

fn open_store(config: &AppConfig) -> Result<FileSecretStore> {
    FileSecretStore::from_settings(&config.secrets).with_context(|| {
        format!(
            "Failed to open the secret file {}",
            config.secrets.path.display()
        )
    })
}

pub async fn put(config: &AppConfig, name: &str, value: Option<&str>) -> Result<()> {
    let reference = SecretRef::bind(name)?;
    let value = match value {
        Some(v) => v.to_string(),
        None => read_input("-")?.trim_end_matches(['\r', '\n']).to_string(),
    };
    let value = SecretValue::new(value);
    if value.is_empty() {
        anyhow::bail!("Refusing to store an empty secret");
    }

    let store = open_store(config)?;
    store.put(&reference, value).await?;
    print_success(&format!(
        "Stored {} in {}",
        reference.name().cyan(),
        store.path().display()
    ));
    Ok(())
}

pub async fn grant(config: &AppConfig, name: &str, grantee: &str) -> Result<()> {
    let reference = SecretRef::bind(name)?;
    let store = open_store(config)?;
    store.grant_read(&reference, grantee).await?;
    print_success(&format!(
        "Granted {} to {}",
        reference.name().cyan(),
        grantee.cyan()
    ));
    Ok(())
}
