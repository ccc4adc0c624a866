//! # descope-auth-provisioning
//!
//! Provisions Descope credentials for a control plane.
//!
//! - [`adapter`] - the [`DescopeAuth`] facade: endpoints, default machine client, extras
//! - [`orchestrator`] - replay-safe reconcile of lifecycle events
//! - [`handler`] - per-invocation state machine against the management API
//! - [`management`] - the management API seam and its HTTP client
//! - [`secrets`] - secret stores (management key, vaulted client secrets)
//! - [`store`] - durable logical-id to physical-id records
//! - [`redelivery`] - host redelivery with backoff
//! - [`users`] - day-2 user management

pub mod adapter;
pub mod handler;
pub mod management;
pub mod orchestrator;
pub mod redelivery;
pub mod secrets;
pub mod store;
pub mod users;

#[cfg(test)]
mod testing;

pub use adapter::{
    AdapterOutputs, AdminUserProps, DEFAULT_MACHINE_CLIENT_DESCRIPTION, DEFAULT_MACHINE_CLIENT_ID,
    DEFAULT_MACHINE_CLIENT_NAME, DescopeAuth, DescopeAuthBuilder, DescopeAuthProps, ManagementAccess,
};
pub use handler::{HandlerState, Invocation, ManagementKey, ProvisioningHandler};
pub use management::{
    AccessKey, AccessKeyDraft, DescopeManagementClient, DescopeUser, IssuedAccessKey,
    ManagementApi, ManagementClientConfig, UserDraft, UserStatus,
};
pub use orchestrator::{LifecycleOrchestrator, ReconcileOutcome, ReconcileStatus};
pub use redelivery::{RedeliveryPolicy, deliver};
pub use secrets::{
    FileSecretStore, InMemorySecretStore, ParametersExtensionStore, SecretStore, vault_reference,
};
pub use store::{
    FileResourceStore, InMemoryResourceStore, ResourceGuard, ResourceRecord, ResourceStore,
};
pub use users::{DEFAULT_LIST_LIMIT, NewUser, UserChanges, UserManagement};
