//! Provisioning handler.
//!
//! One invocation walks `Received → Validated → Executing → Succeeded | Failed`.
//! Validation completes before the management key is resolved or any
//! outbound call is made. The key is resolved from the secret store when the
//! invocation reaches `Executing` and is dropped when it ends.

use std::sync::Arc;

use descope_auth_core::{
    ATTR_CLIENT_ID, ATTR_CLIENT_SECRET, ATTR_LOGIN_ID, ATTR_USER_ID, AdminUserSpec,
    LifecycleOperation, MachineClientSpec, ManagedObject, ManagedObjectRequest,
    ManagedObjectResult, ObjectKind, ResourceProperties, Result, SecretRef, SecretValue,
};

use crate::management::{AccessKeyDraft, DescopeUser, ManagementApi, UserDraft};
use crate::secrets::SecretStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Received,
    Validated,
    Executing,
    Succeeded,
    Failed,
}

impl HandlerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Validated => "Validated",
            Self::Executing => "Executing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

/// The management key, held by reference and resolved on demand.
#[derive(Clone)]
pub struct ManagementKey {
    store: Arc<dyn SecretStore>,
    secret: SecretRef,
    grantee: String,
}

impl ManagementKey {
    pub fn new(store: Arc<dyn SecretStore>, secret: SecretRef, grantee: impl Into<String>) -> Self {
        Self {
            store,
            secret,
            grantee: grantee.into(),
        }
    }

    pub fn secret(&self) -> &SecretRef {
        &self.secret
    }

    pub fn grantee(&self) -> &str {
        &self.grantee
    }

    /// Grant the handler identity read access to the key.
    pub async fn grant(&self) -> Result<()> {
        self.store.grant_read(&self.secret, &self.grantee).await
    }

    pub async fn resolve(&self) -> Result<SecretValue> {
        self.store.resolve(&self.secret, &self.grantee).await
    }
}

impl std::fmt::Debug for ManagementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementKey")
            .field("backend", &self.store.backend())
            .field("secret", &self.secret)
            .field("grantee", &self.grantee)
            .finish()
    }
}

/// One lifecycle invocation as seen by the handler.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub kind: ObjectKind,
    pub operation: LifecycleOperation,
    pub physical_id: Option<&'a str>,
    pub properties: &'a ResourceProperties,
}

/// Records and logs state transitions of one invocation.
struct Transitions {
    kind: ObjectKind,
    operation: LifecycleOperation,
    states: Vec<HandlerState>,
}

impl Transitions {
    fn new(kind: ObjectKind, operation: LifecycleOperation) -> Self {
        Self {
            kind,
            operation,
            states: Vec::with_capacity(4),
        }
    }

    fn enter(&mut self, state: HandlerState) {
        tracing::debug!(
            kind = %self.kind,
            operation = %self.operation,
            state = state.as_str(),
            "handler transition"
        );
        self.states.push(state);
    }
}

/// Executes validated managed-object requests against the management API.
pub struct ProvisioningHandler {
    api: Arc<dyn ManagementApi>,
    key: ManagementKey,
}

impl ProvisioningHandler {
    pub fn new(api: Arc<dyn ManagementApi>, key: ManagementKey) -> Self {
        Self { api, key }
    }

    pub fn management_key(&self) -> &ManagementKey {
        &self.key
    }

    pub fn api(&self) -> &Arc<dyn ManagementApi> {
        &self.api
    }

    pub async fn handle(&self, invocation: Invocation<'_>) -> Result<ManagedObjectResult> {
        self.handle_traced(invocation).await.0
    }

    /// Like [`handle`](Self::handle), also returning the visited states.
    pub async fn handle_traced(
        &self,
        invocation: Invocation<'_>,
    ) -> (Result<ManagedObjectResult>, Vec<HandlerState>) {
        let mut transitions = Transitions::new(invocation.kind, invocation.operation);
        let result = self.run(invocation, &mut transitions).await;

        match &result {
            Ok(outcome) => {
                transitions.enter(HandlerState::Succeeded);
                tracing::info!(
                    kind = %invocation.kind,
                    operation = %invocation.operation,
                    physical_id = %outcome.physical_id,
                    "managed object reconciled upstream"
                );
            }
            Err(e) => {
                transitions.enter(HandlerState::Failed);
                tracing::warn!(
                    kind = %invocation.kind,
                    operation = %invocation.operation,
                    error_kind = %e.kind,
                    error = %e.message,
                    "handler invocation failed"
                );
            }
        }

        (result, transitions.states)
    }

    async fn run(
        &self,
        invocation: Invocation<'_>,
        transitions: &mut Transitions,
    ) -> Result<ManagedObjectResult> {
        transitions.enter(HandlerState::Received);

        let request = ManagedObjectRequest::validate(
            invocation.kind,
            invocation.operation,
            invocation.physical_id,
            invocation.properties,
        )?;
        transitions.enter(HandlerState::Validated);

        transitions.enter(HandlerState::Executing);
        let key = self.key.resolve().await?;
        self.execute(&key, request).await
    }

    async fn execute(
        &self,
        key: &SecretValue,
        request: ManagedObjectRequest,
    ) -> Result<ManagedObjectResult> {
        match request {
            ManagedObjectRequest::Create(ManagedObject::MachineClient(spec)) => {
                let issued = self
                    .api
                    .create_access_key(key, &access_key_draft(&spec))
                    .await?;
                Ok(ManagedObjectResult::new(issued.key.id.clone())
                    .with_attribute(ATTR_CLIENT_ID, issued.key.client_id())
                    .with_secret(ATTR_CLIENT_SECRET, issued.cleartext))
            }
            ManagedObjectRequest::Update {
                physical_id,
                object: ManagedObject::MachineClient(spec),
            } => {
                let updated = self
                    .api
                    .update_access_key(key, &physical_id, &access_key_draft(&spec))
                    .await?;
                Ok(ManagedObjectResult::new(physical_id)
                    .with_attribute(ATTR_CLIENT_ID, updated.client_id()))
            }
            ManagedObjectRequest::Create(ManagedObject::AdminUser(spec)) => {
                let user = self
                    .api
                    .create_user(key, &user_draft(&spec.name, &spec))
                    .await?;
                Ok(user_result(spec.name, &user))
            }
            ManagedObjectRequest::Update {
                physical_id,
                object: ManagedObject::AdminUser(spec),
            } => {
                if spec.name != physical_id {
                    tracing::warn!(
                        login_id = %physical_id,
                        requested = %spec.name,
                        "login id cannot change in place; updating the existing user"
                    );
                }
                let user = self
                    .api
                    .update_user(key, &user_draft(&physical_id, &spec))
                    .await?;
                Ok(user_result(physical_id, &user))
            }
            ManagedObjectRequest::Delete {
                kind: ObjectKind::MachineClient,
                physical_id,
            } => {
                self.api.delete_access_key(key, &physical_id).await?;
                Ok(ManagedObjectResult::new(physical_id))
            }
            ManagedObjectRequest::Delete {
                kind: ObjectKind::AdminUser,
                physical_id,
            } => {
                self.api.delete_user(key, &physical_id).await?;
                Ok(ManagedObjectResult::new(physical_id))
            }
        }
    }
}

fn access_key_draft(spec: &MachineClientSpec) -> AccessKeyDraft {
    AccessKeyDraft {
        name: spec.name.clone(),
        description: spec.description.clone(),
        role_names: Vec::new(),
    }
}

fn user_draft(login_id: &str, spec: &AdminUserSpec) -> UserDraft {
    UserDraft {
        login_id: login_id.to_string(),
        email: Some(spec.email.clone()),
        display_name: spec.display_name.clone(),
        role_names: spec.role.iter().cloned().collect(),
    }
}

fn user_result(login_id: String, user: &DescopeUser) -> ManagedObjectResult {
    ManagedObjectResult::new(login_id.clone())
        .with_attribute(ATTR_USER_ID, user.user_id.clone())
        .with_attribute(ATTR_LOGIN_ID, login_id)
}
