use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use descope_auth_core::{ProvisioningError, Result, SecretRef, SecretValue};

use super::SecretStore;

/// Process-local secret store.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    values: DashMap<String, SecretValue>,
    grants: DashMap<String, BTreeSet<String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret value.
    #[must_use]
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), SecretValue::new(value));
        self
    }

    /// Names of all stored secrets, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_granted(&self, secret: &SecretRef, grantee: &str) -> bool {
        self.grants
            .get(secret.name())
            .is_some_and(|g| g.contains(grantee))
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn grant_read(&self, secret: &SecretRef, grantee: &str) -> Result<()> {
        self.grants
            .entry(secret.name().to_string())
            .or_default()
            .insert(grantee.to_string());
        Ok(())
    }

    async fn resolve(&self, secret: &SecretRef, grantee: &str) -> Result<SecretValue> {
        if !self.is_granted(secret, grantee) {
            return Err(ProvisioningError::access_denied(format!(
                "'{grantee}' holds no read grant on secret '{secret}'"
            )));
        }
        self.values
            .get(secret.name())
            .map(|v| v.value().clone())
            .ok_or_else(|| {
                ProvisioningError::invalid_reference(format!("secret '{secret}' does not exist"))
            })
    }

    async fn put(&self, secret: &SecretRef, value: SecretValue) -> Result<()> {
        self.values.insert(secret.name().to_string(), value);
        Ok(())
    }

    async fn remove(&self, secret: &SecretRef) -> Result<bool> {
        self.grants.remove(secret.name());
        Ok(self.values.remove(secret.name()).is_some())
    }
}
