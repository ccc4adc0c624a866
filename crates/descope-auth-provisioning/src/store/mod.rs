//! Durable physical-id store.
//!
//! Maps each declared resource (by logical id) to the upstream object it
//! produced. The orchestrator consults it before creating anything, which is
//! what makes a replayed Create return the existing object.

mod file;
mod memory;

pub use file::FileResourceStore;
pub use memory::InMemoryResourceStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use descope_auth_core::{ObjectKind, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// What the store remembers about one declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub logical_id: String,
    pub kind: ObjectKind,
    pub physical_id: String,
    /// Published attributes; secret attributes hold vault reference names.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Request id of the event that last wrote this record.
    pub request_id: String,
    pub updated_at: String,
}

impl ResourceRecord {
    pub fn new(
        logical_id: impl Into<String>,
        kind: ObjectKind,
        physical_id: impl Into<String>,
        attributes: BTreeMap<String, String>,
        request_id: impl Into<String>,
    ) -> Self {
        let updated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            logical_id: logical_id.into(),
            kind,
            physical_id: physical_id.into(),
            attributes,
            request_id: request_id.into(),
            updated_at,
        }
    }
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive hold on one logical id for the duration of a reconcile.
///
/// Dropping the last guard for a logical id with no waiters evicts its lock.
pub struct ResourceGuard {
    logical_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl ResourceGuard {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters and new lockers hold a clone, so only the map's own
        // reference remains when nobody else wants this id.
        self.locks
            .remove_if(&self.logical_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("logical_id", &self.logical_id)
            .finish()
    }
}

/// Per-key async locks shared by the store backends.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    locks: Arc<LockMap>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, logical_id: &str) -> ResourceGuard {
        let mutex = self
            .locks
            .entry(logical_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ResourceGuard {
            logical_id: logical_id.to_string(),
            guard: Some(mutex.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Storage for [`ResourceRecord`]s keyed by logical id.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Serialize reconciles of one declared resource.
    async fn lock(&self, logical_id: &str) -> ResourceGuard;

    async fn get(&self, logical_id: &str) -> Result<Option<ResourceRecord>>;

    async fn put(&self, record: ResourceRecord) -> Result<()>;

    /// Remove and return the record, if any.
    async fn remove(&self, logical_id: &str) -> Result<Option<ResourceRecord>>;

    /// All records, ordered by logical id.
    async fn list(&self) -> Result<Vec<ResourceRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_is_exclusive_per_logical_id() {
        let locks = Arc::new(KeyedLocks::default());

        let held = locks.lock("MachineClient").await;
        assert_eq!(held.logical_id(), "MachineClient");

        // A different logical id is independent
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock("AdminUser-ops"))
            .await;
        assert!(other.is_ok());

        // The same one waits until released
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.lock("MachineClient")).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired =
            tokio::time::timeout(Duration::from_millis(50), locks.lock("MachineClient")).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_evicted() {
        let locks = Arc::new(KeyedLocks::default());

        let held = locks.lock("MachineClient").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let guard = locks.lock("MachineClient").await;
                guard.logical_id().to_string()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still needs the lock, so it survives the first release
        drop(held);
        assert_eq!(waiter.await.unwrap(), "MachineClient");
        assert_eq!(locks.len(), 0);

        for i in 0..32 {
            drop(locks.lock(&format!("AdminUser-{i}")).await);
        }
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = ResourceRecord::new(
            "MachineClient",
            ObjectKind::MachineClient,
            "K2abc",
            BTreeMap::from([("ClientId".to_string(), "C-1".to_string())]),
            "req-1",
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["logicalId"], "MachineClient");
        assert_eq!(json["kind"], "Custom::DescopeMachineClient");
        assert_eq!(json["physicalId"], "K2abc");
        assert!(json["updatedAt"].as_str().unwrap().contains('T'));
    }
}
