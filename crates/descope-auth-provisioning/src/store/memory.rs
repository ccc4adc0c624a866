use async_trait::async_trait;
use dashmap::DashMap;
use descope_auth_core::Result;

use super::{KeyedLocks, ResourceGuard, ResourceRecord, ResourceStore};

/// Process-local resource store.
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    records: DashMap<String, ResourceRecord>,
    locks: KeyedLocks,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn lock(&self, logical_id: &str) -> ResourceGuard {
        self.locks.lock(logical_id).await
    }

    async fn get(&self, logical_id: &str) -> Result<Option<ResourceRecord>> {
        Ok(self.records.get(logical_id).map(|r| r.value().clone()))
    }

    async fn put(&self, record: ResourceRecord) -> Result<()> {
        self.records.insert(record.logical_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, logical_id: &str) -> Result<Option<ResourceRecord>> {
        Ok(self.records.remove(logical_id).map(|(_, r)| r))
    }

    async fn list(&self) -> Result<Vec<ResourceRecord>> {
        let mut records: Vec<ResourceRecord> =
            self.records.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        Ok(records)
    }
}
