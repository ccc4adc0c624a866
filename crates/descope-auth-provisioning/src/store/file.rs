use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use descope_auth_core::{ProvisioningError, Result};
use tokio::sync::Mutex;

use super::{KeyedLocks, ResourceGuard, ResourceRecord, ResourceStore};
use crate::secrets::write_atomically;

/// Resource store persisted as a JSON object keyed by logical id.
#[derive(Debug)]
pub struct FileResourceStore {
    path: PathBuf,
    io: Mutex<()>,
    locks: KeyedLocks,
}

impl FileResourceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
            locks: KeyedLocks::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, ResourceRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ProvisioningError::storage(format!(
                    "resource state {} is corrupt: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ProvisioningError::storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, records: &BTreeMap<String, ResourceRecord>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| ProvisioningError::storage(format!("failed to encode state: {e}")))?;
        write_atomically(&self.path, &bytes).await
    }
}

#[async_trait]
impl ResourceStore for FileResourceStore {
    async fn lock(&self, logical_id: &str) -> ResourceGuard {
        self.locks.lock(logical_id).await
    }

    async fn get(&self, logical_id: &str) -> Result<Option<ResourceRecord>> {
        let _io = self.io.lock().await;
        Ok(self.load().await?.remove(logical_id))
    }

    async fn put(&self, record: ResourceRecord) -> Result<()> {
        let _io = self.io.lock().await;
        let mut records = self.load().await?;
        records.insert(record.logical_id.clone(), record);
        self.save(&records).await
    }

    async fn remove(&self, logical_id: &str) -> Result<Option<ResourceRecord>> {
        let _io = self.io.lock().await;
        let mut records = self.load().await?;
        let removed = records.remove(logical_id);
        if removed.is_some() {
            self.save(&records).await?;
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<ResourceRecord>> {
        let _io = self.io.lock().await;
        Ok(self.load().await?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descope_auth_core::{ErrorKind, ObjectKind};
    use tempfile::TempDir;

    fn record(logical_id: &str, physical_id: &str) -> ResourceRecord {
        ResourceRecord::new(
            logical_id,
            ObjectKind::AdminUser,
            physical_id,
            BTreeMap::new(),
            "req-1",
        )
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/resources.json");

        let store = FileResourceStore::new(&path);
        store.put(record("AdminUser-ops", "ops-admin")).await.unwrap();
        store.put(record("AdminUser-dev", "dev-admin")).await.unwrap();

        let reopened = FileResourceStore::new(&path);
        let found = reopened.get("AdminUser-ops").await.unwrap().unwrap();
        assert_eq!(found.physical_id, "ops-admin");

        let ids: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.logical_id)
            .collect();
        assert_eq!(ids, vec!["AdminUser-dev", "AdminUser-ops"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileResourceStore::new(dir.path().join("resources.json"));

        assert!(store.remove("missing").await.unwrap().is_none());
        store.put(record("AdminUser-ops", "ops-admin")).await.unwrap();
        assert!(store.remove("AdminUser-ops").await.unwrap().is_some());
        assert!(store.get("AdminUser-ops").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resources.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileResourceStore::new(&path).get("x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }
}
