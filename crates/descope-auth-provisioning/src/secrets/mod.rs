//! Secret stores.
//!
//! A [`SecretStore`] holds named secrets and the read grants on them. The
//! management key is resolved through a store at the moment a handler
//! invocation needs it, and client secrets issued during provisioning are
//! written to a store (the vault) so they never travel as plaintext outputs.
//!
//! Backends:
//!
//! - [`InMemorySecretStore`] - process-local, used in tests and dry runs
//! - [`FileSecretStore`] - AES-256-GCM sealed JSON file
//! - [`ParametersExtensionStore`] - read-only, served by the local parameters extension

mod extension;
mod file;
mod memory;

pub use extension::ParametersExtensionStore;
pub use file::FileSecretStore;
pub use memory::InMemorySecretStore;

pub(crate) use file::write_atomically;

use async_trait::async_trait;
use descope_auth_core::{Result, SecretRef, SecretValue};

/// A named-secret store with per-secret read grants.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    /// Allow `grantee` to resolve `secret`. Granting twice is a no-op.
    async fn grant_read(&self, secret: &SecretRef, grantee: &str) -> Result<()>;

    /// Resolve the current value of `secret` on behalf of `grantee`.
    ///
    /// # Errors
    ///
    /// `AccessDenied` when `grantee` holds no grant, `InvalidReference` when
    /// no secret of that name exists.
    async fn resolve(&self, secret: &SecretRef, grantee: &str) -> Result<SecretValue>;

    /// Store or replace a secret value.
    async fn put(&self, secret: &SecretRef, value: SecretValue) -> Result<()>;

    /// Remove a secret and its grants. Returns whether anything was removed.
    async fn remove(&self, secret: &SecretRef) -> Result<bool>;
}

/// Vault reference name for a secret attribute of a managed object.
///
/// `ClientSecret` on logical id `MachineClient` under prefix `/descope-auth`
/// becomes `/descope-auth/MachineClient/client-secret`.
pub fn vault_reference(prefix: &str, logical_id: &str, attribute: &str) -> String {
    let mut slug = String::with_capacity(attribute.len() + 4);
    for (i, ch) in attribute.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
        } else {
            slug.push(ch);
        }
    }
    format!("{}/{}/{}", prefix.trim_end_matches('/'), logical_id, slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_reference_kebab_cases_attribute() {
        assert_eq!(
            vault_reference("/descope-auth", "MachineClient", "ClientSecret"),
            "/descope-auth/MachineClient/client-secret"
        );
        assert_eq!(
            vault_reference("/descope-auth/", "AdminUser-ops", "Password"),
            "/descope-auth/AdminUser-ops/password"
        );
    }
}
