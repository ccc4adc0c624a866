use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use descope_auth_config::{Keyring, SealedSecret, SecretsSettings};
use descope_auth_core::{ProvisioningError, Result, SecretRef, SecretValue};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::SecretStore;

/// On-disk layout of the secrets file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsDocument {
    #[serde(default)]
    secrets: BTreeMap<String, SealedSecret>,
    #[serde(default)]
    grants: BTreeMap<String, BTreeSet<String>>,
}

/// Secret store backed by a JSON file of AES-256-GCM sealed values.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, serialized by an in-process lock.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    keyring: Keyring,
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>, keyring: Keyring) -> Self {
        Self {
            path: path.into(),
            keyring,
            lock: Mutex::new(()),
        }
    }

    /// Open the store described by the `[secrets]` config section.
    ///
    /// The sealing key is read from the environment variable named by
    /// `key_env`; its absence is an error.
    pub fn from_settings(settings: &SecretsSettings) -> Result<Self> {
        let keyring = Keyring::from_env(&settings.key_env)
            .map_err(|e| ProvisioningError::storage(e.to_string()))?
            .ok_or_else(|| {
                ProvisioningError::storage(format!(
                    "sealing key environment variable {} is not set",
                    settings.key_env
                ))
            })?;
        Ok(Self::new(&settings.path, keyring))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SecretsDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ProvisioningError::storage(format!(
                    "secrets file {} is corrupt: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SecretsDocument::default()),
            Err(e) => Err(ProvisioningError::storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, doc: &SecretsDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| ProvisioningError::storage(format!("failed to encode secrets: {e}")))?;
        write_atomically(&self.path, &bytes).await
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |e: std::io::Error| {
        ProvisioningError::storage(format!("failed to write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[async_trait]
impl SecretStore for FileSecretStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn grant_read(&self, secret: &SecretRef, grantee: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let inserted = doc
            .grants
            .entry(secret.name().to_string())
            .or_default()
            .insert(grantee.to_string());
        if inserted {
            self.save(&doc).await?;
        }
        Ok(())
    }

    async fn resolve(&self, secret: &SecretRef, grantee: &str) -> Result<SecretValue> {
        let doc = {
            let _guard = self.lock.lock().await;
            self.load().await?
        };

        let granted = doc
            .grants
            .get(secret.name())
            .is_some_and(|g| g.contains(grantee));
        if !granted {
            return Err(ProvisioningError::access_denied(format!(
                "'{grantee}' holds no read grant on secret '{secret}'"
            )));
        }

        let sealed = doc.secrets.get(secret.name()).ok_or_else(|| {
            ProvisioningError::invalid_reference(format!("secret '{secret}' does not exist"))
        })?;

        self.keyring
            .open(sealed)
            .map_err(|e| ProvisioningError::storage(format!("cannot open '{secret}': {e}")))
    }

    async fn put(&self, secret: &SecretRef, value: SecretValue) -> Result<()> {
        let sealed = self
            .keyring
            .seal(&value)
            .map_err(|e| ProvisioningError::storage(format!("cannot seal '{secret}': {e}")))?;

        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        doc.secrets.insert(secret.name().to_string(), sealed);
        self.save(&doc).await
    }

    async fn remove(&self, secret: &SecretRef) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let removed = doc.secrets.remove(secret.name()).is_some();
        let had_grants = doc.grants.remove(secret.name()).is_some();
        if removed || had_grants {
            self.save(&doc).await?;
        }
        Ok(removed)
    }
}
