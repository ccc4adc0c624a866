//! Custom-resource lifecycle orchestration.
//!
//! Turns one [`LifecycleEvent`] for a declared resource into exactly one
//! handler invocation (or none, for a replay), keeping the durable
//! logical-id to physical-id record and the secret vault in step.
//!
//! Replay rules:
//!
//! - Create for a logical id that already has a record returns that record
//!   without calling upstream.
//! - Delete of an object that is already gone upstream succeeds.
//! - Update and Delete take the physical id from the event, falling back to
//!   the stored record.

use std::collections::BTreeMap;
use std::sync::Arc;

use descope_auth_core::{
    ATTR_CLIENT_SECRET, LifecycleEvent, LifecycleOperation, LifecycleResponse, ManagedObjectResult,
    ObjectKind, ProvisioningError, Result, SecretRef,
};
use serde::Serialize;
use tracing::instrument;

use crate::handler::{Invocation, ProvisioningHandler};
use crate::secrets::{SecretStore, vault_reference};
use crate::store::{ResourceRecord, ResourceStore};

/// Attributes whose stored value is a vault reference name.
const SECRET_ATTRIBUTES: &[&str] = &[ATTR_CLIENT_SECRET];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcileStatus {
    Created,
    /// A Create for a logical id that already had an object.
    Replayed,
    Updated,
    Deleted,
    /// A Delete for an object that no longer existed.
    AlreadyDeleted,
}

/// Result of reconciling one lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub logical_id: String,
    pub kind: ObjectKind,
    pub physical_id: String,
    pub attributes: BTreeMap<String, String>,
    pub status: ReconcileStatus,
}

impl ReconcileOutcome {
    fn from_record(record: ResourceRecord, status: ReconcileStatus) -> Self {
        Self {
            logical_id: record.logical_id,
            kind: record.kind,
            physical_id: record.physical_id,
            attributes: record.attributes,
            status,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

pub struct LifecycleOrchestrator {
    handler: ProvisioningHandler,
    store: Arc<dyn ResourceStore>,
    vault: Arc<dyn SecretStore>,
    vault_prefix: String,
}

impl LifecycleOrchestrator {
    pub fn new(
        handler: ProvisioningHandler,
        store: Arc<dyn ResourceStore>,
        vault: Arc<dyn SecretStore>,
        vault_prefix: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            store,
            vault,
            vault_prefix: vault_prefix.into(),
        }
    }

    pub fn handler(&self) -> &ProvisioningHandler {
        &self.handler
    }

    pub fn vault(&self) -> &Arc<dyn SecretStore> {
        &self.vault
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Reconcile and render the host response.
    pub async fn respond(&self, event: &LifecycleEvent) -> LifecycleResponse {
        match self.reconcile(event).await {
            Ok(outcome) => LifecycleResponse::success(event, outcome.physical_id, outcome.attributes),
            Err(e) => LifecycleResponse::failure(event, &e),
        }
    }

    #[instrument(skip_all, fields(
        request_id = %event.request_id,
        logical_id = %event.logical_resource_id,
        operation = %event.operation,
    ))]
    pub async fn reconcile(&self, event: &LifecycleEvent) -> Result<ReconcileOutcome> {
        if event.logical_resource_id.trim().is_empty() {
            return Err(ProvisioningError::invalid_request(
                "LogicalResourceId must not be empty",
            ));
        }

        let _guard = self.store.lock(&event.logical_resource_id).await;
        let stored = self.store.get(&event.logical_resource_id).await?;

        if let Some(record) = &stored
            && record.kind != event.resource_type
        {
            return Err(ProvisioningError::invalid_request(format!(
                "{} is declared as {} but was created as {}",
                event.logical_resource_id, event.resource_type, record.kind
            )));
        }

        match event.operation {
            LifecycleOperation::Create => self.create(event, stored).await,
            LifecycleOperation::Update => self.update(event, stored).await,
            LifecycleOperation::Delete => self.delete(event, stored).await,
        }
    }

    async fn create(
        &self,
        event: &LifecycleEvent,
        stored: Option<ResourceRecord>,
    ) -> Result<ReconcileOutcome> {
        if let Some(record) = stored {
            tracing::info!(
                physical_id = %record.physical_id,
                "create replayed, returning existing object"
            );
            return Ok(ReconcileOutcome::from_record(record, ReconcileStatus::Replayed));
        }

        let result = self
            .handler
            .handle(Invocation {
                kind: event.resource_type,
                operation: LifecycleOperation::Create,
                physical_id: None,
                properties: &event.resource_properties,
            })
            .await
            .map_err(missing_is_rejection)?;

        let record = self.persist(event, BTreeMap::new(), result).await?;
        Ok(ReconcileOutcome::from_record(record, ReconcileStatus::Created))
    }

    async fn update(
        &self,
        event: &LifecycleEvent,
        stored: Option<ResourceRecord>,
    ) -> Result<ReconcileOutcome> {
        let physical_id = resolve_physical_id(event, stored.as_ref()).ok_or_else(|| {
            ProvisioningError::invalid_request(format!(
                "no physical id known for {}; it was never created",
                event.logical_resource_id
            ))
        })?;

        let result = self
            .handler
            .handle(Invocation {
                kind: event.resource_type,
                operation: LifecycleOperation::Update,
                physical_id: Some(&physical_id),
                properties: &event.resource_properties,
            })
            .await
            .map_err(missing_is_rejection)?;

        let prior = stored.map(|r| r.attributes).unwrap_or_default();
        let record = self.persist(event, prior, result).await?;
        Ok(ReconcileOutcome::from_record(record, ReconcileStatus::Updated))
    }

    async fn delete(
        &self,
        event: &LifecycleEvent,
        stored: Option<ResourceRecord>,
    ) -> Result<ReconcileOutcome> {
        let Some(physical_id) = resolve_physical_id(event, stored.as_ref()) else {
            tracing::info!("delete of a resource that was never created");
            return Ok(ReconcileOutcome {
                logical_id: event.logical_resource_id.clone(),
                kind: event.resource_type,
                physical_id: event.logical_resource_id.clone(),
                attributes: BTreeMap::new(),
                status: ReconcileStatus::AlreadyDeleted,
            });
        };

        let status = match self
            .handler
            .handle(Invocation {
                kind: event.resource_type,
                operation: LifecycleOperation::Delete,
                physical_id: Some(&physical_id),
                properties: &event.resource_properties,
            })
            .await
        {
            Ok(_) => ReconcileStatus::Deleted,
            Err(e) if e.is_not_found() => {
                tracing::info!(physical_id = %physical_id, "object already gone upstream");
                ReconcileStatus::AlreadyDeleted
            }
            Err(e) => return Err(e),
        };

        if let Some(record) = self.store.remove(&event.logical_resource_id).await? {
            self.discard_secrets(&record).await;
        }

        Ok(ReconcileOutcome {
            logical_id: event.logical_resource_id.clone(),
            kind: event.resource_type,
            physical_id,
            attributes: BTreeMap::new(),
            status,
        })
    }

    /// Move secrets into the vault, then write the record.
    ///
    /// The upstream object already exists at this point. Any failure undoes
    /// the vault writes and reports the physical id so the host can delete
    /// the object.
    async fn persist(
        &self,
        event: &LifecycleEvent,
        mut attributes: BTreeMap<String, String>,
        result: ManagedObjectResult,
    ) -> Result<ResourceRecord> {
        let ManagedObjectResult {
            physical_id,
            attributes: fresh,
            secrets,
        } = result;
        attributes.extend(fresh);

        let mut vaulted = Vec::with_capacity(secrets.len());
        for (name, value) in secrets {
            let stored = match SecretRef::bind(vault_reference(
                &self.vault_prefix,
                &event.logical_resource_id,
                &name,
            )) {
                Ok(reference) => match self.vault.put(&reference, value).await {
                    Ok(()) => Ok(reference),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            match stored {
                Ok(reference) => {
                    attributes.insert(name, reference.name().to_string());
                    vaulted.push(reference);
                }
                Err(e) => {
                    tracing::error!(
                        physical_id = %physical_id,
                        secret = %name,
                        error = %e,
                        "upstream object exists but its secret could not be stored"
                    );
                    self.discard(&vaulted).await;
                    return Err(e.with_physical_id(physical_id));
                }
            }
        }

        let record = ResourceRecord::new(
            event.logical_resource_id.clone(),
            event.resource_type,
            physical_id,
            attributes,
            event.request_id.clone(),
        );
        if let Err(e) = self.store.put(record.clone()).await {
            tracing::error!(
                physical_id = %record.physical_id,
                error = %e,
                "upstream object exists but its record could not be written"
            );
            self.discard(&vaulted).await;
            return Err(e.with_physical_id(record.physical_id));
        }
        Ok(record)
    }

    async fn discard_secrets(&self, record: &ResourceRecord) {
        let references: Vec<SecretRef> = SECRET_ATTRIBUTES
            .iter()
            .filter_map(|attribute| record.attributes.get(*attribute))
            .filter_map(|name| match SecretRef::bind(name.clone()) {
                Ok(reference) => Some(reference),
                Err(e) => {
                    tracing::warn!(secret = %name, error = %e, "stored secret reference is malformed");
                    None
                }
            })
            .collect();
        self.discard(&references).await;
    }

    async fn discard(&self, references: &[SecretRef]) {
        for reference in references {
            if let Err(e) = self.vault.remove(reference).await {
                tracing::warn!(secret = %reference, error = %e, "failed to remove vaulted secret");
            }
        }
    }
}

/// A Create or Update whose target is missing upstream cannot be redelivered
/// into success.
fn missing_is_rejection(error: ProvisioningError) -> ProvisioningError {
    if error.is_not_found() {
        ProvisioningError::upstream_rejected(error.message)
    } else {
        error
    }
}

fn resolve_physical_id(event: &LifecycleEvent, stored: Option<&ResourceRecord>) -> Option<String> {
    let from_event = event
        .prior_physical_id
        .as_deref()
        .filter(|id| !id.trim().is_empty());

    if let (Some(from_event), Some(record)) = (from_event, stored)
        && from_event != record.physical_id
    {
        tracing::warn!(
            event_physical_id = %from_event,
            stored_physical_id = %record.physical_id,
            "physical id in event differs from stored record; using the event's"
        );
    }

    from_event
        .map(str::to_string)
        .or_else(|| stored.map(|r| r.physical_id.clone()))
}
