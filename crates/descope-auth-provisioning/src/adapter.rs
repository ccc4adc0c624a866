//! The adapter facade consumed by the control plane.
//!
//! Construction resolves the endpoints, binds the management key reference,
//! grants it to the handler identity and provisions the default machine
//! client. Everything published afterwards is immutable; changing the project
//! or domain means building a new adapter.
//!
//! ```ignore
//! let auth = DescopeAuth::builder(DescopeAuthProps::new(project_id, "/descope/management-key"))
//!     .key_store(store)
//!     .build()
//!     .await?;
//! println!("issuer: {}", auth.jwt_issuer());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use descope_auth_config::{AppConfig, DescopeSettings, SecretsBackend};
use descope_auth_core::{
    ATTR_CLIENT_ID, ATTR_CLIENT_SECRET, DomainSettings, LifecycleEvent, LifecycleOperation,
    LifecycleResponse, ObjectKind, ProjectIdentity, ProvisioningError, ResolvedEndpoints,
    ResourceProperties, Result, SecretRef,
};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::handler::{ManagementKey, ProvisioningHandler};
use crate::management::{AccessKey, DescopeManagementClient, ManagementApi, ManagementClientConfig};
use crate::orchestrator::{LifecycleOrchestrator, ReconcileOutcome};
use crate::redelivery::{RedeliveryPolicy, deliver};
use crate::secrets::{FileSecretStore, ParametersExtensionStore, SecretStore};
use crate::store::{FileResourceStore, InMemoryResourceStore, ResourceStore};
use crate::users::UserManagement;

/// Logical id of the machine client provisioned at construction.
pub const DEFAULT_MACHINE_CLIENT_ID: &str = "MachineClient";
pub const DEFAULT_MACHINE_CLIENT_NAME: &str = "SBT Auto-generated Access Key";
pub const DEFAULT_MACHINE_CLIENT_DESCRIPTION: &str =
    "Auto generated Access Key to be used with Client Credentials Flow";

pub const DEFAULT_CALLBACK_URL: &str = "http://localhost";
pub const DEFAULT_HANDLER_IDENTITY: &str = "descope-provisioning-handler";
pub const DEFAULT_VAULT_PREFIX: &str = "/descope-auth";

/// Construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescopeAuthProps {
    pub project_id: String,
    pub domain: Option<String>,
    pub client_secret_parameter_name: String,
    pub control_plane_callback_url: Option<String>,
    pub set_api_gw_scopes: Option<bool>,
}

impl DescopeAuthProps {
    pub fn new(project_id: impl Into<String>, client_secret_parameter_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            domain: None,
            client_secret_parameter_name: client_secret_parameter_name.into(),
            control_plane_callback_url: None,
            set_api_gw_scopes: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_control_plane_callback_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_callback_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_api_gw_scopes(mut self, enabled: bool) -> Self {
        self.set_api_gw_scopes = Some(enabled);
        self
    }
}

impl From<&DescopeSettings> for DescopeAuthProps {
    fn from(settings: &DescopeSettings) -> Self {
        Self {
            project_id: settings.project_id.clone(),
            domain: settings.domain.clone(),
            client_secret_parameter_name: settings.client_secret_parameter_name.clone(),
            control_plane_callback_url: Some(settings.control_plane_callback_url.clone()),
            set_api_gw_scopes: Some(settings.set_api_gw_scopes),
        }
    }
}

/// Properties of an additional admin user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminUserProps {
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub display_name: Option<String>,
}

/// Everything the adapter publishes, as one serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOutputs {
    pub jwt_issuer: String,
    pub jwt_audience: Vec<String>,
    pub management_base_url: String,
    pub token_endpoint: String,
    pub well_known_url: String,
    pub user_client_id: String,
    pub machine_client_id: String,
    /// Reference name, never the value.
    pub machine_client_secret: SecretRef,
    #[serde(rename = "controlPlaneCallbackURL")]
    pub control_plane_callback_url: String,
    #[serde(rename = "setAPIGWScopes")]
    pub set_api_gw_scopes: bool,
}

pub struct DescopeAuthBuilder {
    props: DescopeAuthProps,
    domain_settings: DomainSettings,
    key_store: Option<Arc<dyn SecretStore>>,
    vault: Option<Arc<dyn SecretStore>>,
    vault_prefix: String,
    resource_store: Option<Arc<dyn ResourceStore>>,
    handler_identity: String,
    client_config: ManagementClientConfig,
    api: Option<Arc<dyn ManagementApi>>,
    redelivery: RedeliveryPolicy,
    extension_layers: BTreeMap<String, String>,
}

impl DescopeAuthBuilder {
    pub fn new(props: DescopeAuthProps) -> Self {
        Self {
            props,
            domain_settings: DomainSettings::default(),
            key_store: None,
            vault: None,
            vault_prefix: DEFAULT_VAULT_PREFIX.to_string(),
            resource_store: None,
            handler_identity: DEFAULT_HANDLER_IDENTITY.to_string(),
            client_config: ManagementClientConfig::default(),
            api: None,
            redelivery: RedeliveryPolicy::default(),
            extension_layers: BTreeMap::new(),
        }
    }

    /// Builder wired from a loaded configuration: stores, timeouts,
    /// redelivery and the extension layer table.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.management.request_timeout();
        let (key_store, vault): (Arc<dyn SecretStore>, Arc<dyn SecretStore>) =
            match config.secrets.backend {
                SecretsBackend::File => {
                    let store: Arc<dyn SecretStore> =
                        Arc::new(FileSecretStore::from_settings(&config.secrets)?);
                    (store.clone(), store)
                }
                SecretsBackend::Extension => (
                    Arc::new(ParametersExtensionStore::from_settings(
                        &config.secrets,
                        timeout,
                    )?),
                    Arc::new(FileSecretStore::from_settings(&config.secrets)?),
                ),
            };

        Ok(Self::new(DescopeAuthProps::from(&config.descope))
            .domain_settings(config.domain.clone())
            .key_store(key_store)
            .vault(vault, config.secrets.vault_prefix.clone())
            .resource_store(Arc::new(FileResourceStore::new(&config.state.path)))
            .handler_identity(config.handler.identity.clone())
            .client_config(ManagementClientConfig::from(&config.management))
            .redelivery(RedeliveryPolicy::from(&config.redelivery))
            .extension_layers(config.handler.extension_layers.clone()))
    }

    #[must_use]
    pub fn domain_settings(mut self, settings: DomainSettings) -> Self {
        self.domain_settings = settings;
        self
    }

    /// Store holding the management key. Also used as the vault unless one is set.
    #[must_use]
    pub fn key_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.key_store = Some(store);
        self
    }

    #[must_use]
    pub fn vault(mut self, store: Arc<dyn SecretStore>, prefix: impl Into<String>) -> Self {
        self.vault = Some(store);
        self.vault_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn resource_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.resource_store = Some(store);
        self
    }

    #[must_use]
    pub fn handler_identity(mut self, identity: impl Into<String>) -> Self {
        self.handler_identity = identity.into();
        self
    }

    #[must_use]
    pub fn client_config(mut self, config: ManagementClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Use this management API instead of an HTTP client on the resolved base URL.
    #[must_use]
    pub fn management_api(mut self, api: Arc<dyn ManagementApi>) -> Self {
        self.api = Some(api);
        self
    }

    #[must_use]
    pub fn redelivery(mut self, policy: RedeliveryPolicy) -> Self {
        self.redelivery = policy;
        self
    }

    #[must_use]
    pub fn extension_layers(mut self, layers: BTreeMap<String, String>) -> Self {
        self.extension_layers = layers;
        self
    }

    /// Reach the management API with the granted key, provisioning nothing.
    pub async fn management_access(self) -> Result<ManagementAccess> {
        let identity = ProjectIdentity::new(self.props.project_id.clone(), self.props.domain.clone())?;
        let key_ref = SecretRef::bind(self.props.client_secret_parameter_name.clone())?;
        let key_store = self.key_store.ok_or_else(missing_key_store)?;

        let endpoints = ResolvedEndpoints::resolve(&identity, &self.domain_settings);
        let api = connect(self.api, &identity, &endpoints, self.client_config)?;

        let key = ManagementKey::new(key_store, key_ref, self.handler_identity);
        key.grant().await?;
        Ok(ManagementAccess { api, key })
    }

    /// Validate inputs, then provision (or replay) the default machine client.
    pub async fn build(self) -> Result<DescopeAuth> {
        let identity = ProjectIdentity::new(self.props.project_id.clone(), self.props.domain.clone())?;
        let key_ref = SecretRef::bind(self.props.client_secret_parameter_name.clone())?;
        let callback = parse_callback_url(self.props.control_plane_callback_url.as_deref())?;

        let key_store = self.key_store.ok_or_else(missing_key_store)?;
        let vault = self.vault.unwrap_or_else(|| key_store.clone());
        let resource_store = self
            .resource_store
            .unwrap_or_else(|| Arc::new(InMemoryResourceStore::new()));

        let endpoints = ResolvedEndpoints::resolve(&identity, &self.domain_settings);
        tracing::info!(
            project_id = identity.project_id(),
            management_base_url = %endpoints.management_base_url,
            "resolved Descope endpoints"
        );

        let api = connect(self.api, &identity, &endpoints, self.client_config)?;

        let key = ManagementKey::new(key_store, key_ref, self.handler_identity);
        key.grant().await?;

        let orchestrator = LifecycleOrchestrator::new(
            ProvisioningHandler::new(api.clone(), key.clone()),
            resource_store,
            vault,
            self.vault_prefix,
        );
        let users = UserManagement::new(api, key);

        let event = LifecycleEvent::new(
            LifecycleOperation::Create,
            ObjectKind::MachineClient,
            Uuid::new_v4().to_string(),
            DEFAULT_MACHINE_CLIENT_ID,
            ResourceProperties::machine_client(
                DEFAULT_MACHINE_CLIENT_NAME,
                Some(DEFAULT_MACHINE_CLIENT_DESCRIPTION.to_string()),
            ),
        );
        let outcome = deliver(&orchestrator, &event, &self.redelivery).await?;
        let (machine_client_id, machine_client_secret) = client_credentials(&outcome)?;

        tracing::info!(
            machine_client_id = %machine_client_id,
            machine_client_secret = %machine_client_secret,
            status = ?outcome.status,
            "default machine client ready"
        );

        Ok(DescopeAuth {
            user_client_id: identity.project_id().to_string(),
            identity,
            endpoints,
            machine_client_id,
            machine_client_secret,
            control_plane_callback_url: callback,
            set_api_gw_scopes: self.props.set_api_gw_scopes.unwrap_or(true),
            orchestrator,
            users,
            redelivery: self.redelivery,
            extension_layers: self.extension_layers,
        })
    }
}

/// Management API plus a granted key, for commands that only read or
/// manage users.
pub struct ManagementAccess {
    api: Arc<dyn ManagementApi>,
    key: ManagementKey,
}

impl ManagementAccess {
    pub fn users(&self) -> UserManagement {
        UserManagement::new(self.api.clone(), self.key.clone())
    }

    /// Every access key in the project, whoever created it.
    pub async fn list_access_keys(&self) -> Result<Vec<AccessKey>> {
        let key = self.key.resolve().await?;
        self.api.search_access_keys(&key).await
    }
}

/// The provisioned adapter.
pub struct DescopeAuth {
    identity: ProjectIdentity,
    endpoints: ResolvedEndpoints,
    user_client_id: String,
    machine_client_id: String,
    machine_client_secret: SecretRef,
    control_plane_callback_url: Url,
    set_api_gw_scopes: bool,
    orchestrator: LifecycleOrchestrator,
    users: UserManagement,
    redelivery: RedeliveryPolicy,
    extension_layers: BTreeMap<String, String>,
}

impl DescopeAuth {
    pub fn builder(props: DescopeAuthProps) -> DescopeAuthBuilder {
        DescopeAuthBuilder::new(props)
    }

    pub fn project_id(&self) -> &str {
        self.identity.project_id()
    }

    pub fn endpoints(&self) -> &ResolvedEndpoints {
        &self.endpoints
    }

    pub fn jwt_issuer(&self) -> &str {
        &self.endpoints.jwt_issuer
    }

    pub fn jwt_audience(&self) -> &[String] {
        &self.endpoints.jwt_audience
    }

    pub fn management_base_url(&self) -> &str {
        &self.endpoints.management_base_url
    }

    pub fn token_endpoint(&self) -> &str {
        &self.endpoints.token_endpoint
    }

    pub fn well_known_url(&self) -> &str {
        &self.endpoints.well_known_url
    }

    pub fn user_client_id(&self) -> &str {
        &self.user_client_id
    }

    pub fn machine_client_id(&self) -> &str {
        &self.machine_client_id
    }

    pub fn machine_client_secret(&self) -> &SecretRef {
        &self.machine_client_secret
    }

    pub fn control_plane_callback_url(&self) -> &Url {
        &self.control_plane_callback_url
    }

    pub fn set_api_gw_scopes(&self) -> bool {
        self.set_api_gw_scopes
    }

    pub fn outputs(&self) -> AdapterOutputs {
        AdapterOutputs {
            jwt_issuer: self.endpoints.jwt_issuer.clone(),
            jwt_audience: self.endpoints.jwt_audience.clone(),
            management_base_url: self.endpoints.management_base_url.clone(),
            token_endpoint: self.endpoints.token_endpoint.clone(),
            well_known_url: self.endpoints.well_known_url.clone(),
            user_client_id: self.user_client_id.clone(),
            machine_client_id: self.machine_client_id.clone(),
            machine_client_secret: self.machine_client_secret.clone(),
            control_plane_callback_url: self.control_plane_callback_url.to_string(),
            set_api_gw_scopes: self.set_api_gw_scopes,
        }
    }

    /// Create one more admin user, declared as `AdminUser-{resource_id}`.
    ///
    /// Calling again with the same `resource_id` replays the first result.
    pub async fn create_additional_admin_user(
        &self,
        resource_id: &str,
        user: AdminUserProps,
    ) -> Result<ReconcileOutcome> {
        let props = ResourceProperties::admin_user(user.name, user.email, user.role, user.display_name);
        self.create_declared(ObjectKind::AdminUser, "AdminUser", resource_id, props)
            .await
    }

    /// Create one more machine client, declared as `MachineClient-{resource_id}`.
    pub async fn create_machine_client(
        &self,
        resource_id: &str,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<ReconcileOutcome> {
        let props = ResourceProperties::machine_client(name, description);
        self.create_declared(ObjectKind::MachineClient, "MachineClient", resource_id, props)
            .await
    }

    /// Handle a lifecycle event delivered by the host.
    pub async fn handle_event(&self, event: &LifecycleEvent) -> LifecycleResponse {
        self.orchestrator.respond(event).await
    }

    /// Let another identity (e.g. the control plane) read the machine client secret.
    pub async fn grant_machine_client_secret(&self, grantee: &str) -> Result<()> {
        self.orchestrator
            .vault()
            .grant_read(&self.machine_client_secret, grantee)
            .await
    }

    /// Secrets extension layer for a deployment region, from configuration.
    pub fn extension_layer(&self, region: &str) -> Option<&str> {
        self.extension_layers.get(region).map(String::as_str)
    }

    pub fn orchestrator(&self) -> &LifecycleOrchestrator {
        &self.orchestrator
    }

    pub fn users(&self) -> &UserManagement {
        &self.users
    }

    async fn create_declared(
        &self,
        kind: ObjectKind,
        prefix: &str,
        resource_id: &str,
        props: ResourceProperties,
    ) -> Result<ReconcileOutcome> {
        let resource_id = resource_id.trim();
        if resource_id.is_empty() {
            return Err(ProvisioningError::invalid_request("resource id is required"));
        }

        let event = LifecycleEvent::new(
            LifecycleOperation::Create,
            kind,
            Uuid::new_v4().to_string(),
            format!("{prefix}-{resource_id}"),
            props,
        );
        deliver(&self.orchestrator, &event, &self.redelivery).await
    }
}

impl std::fmt::Debug for DescopeAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescopeAuth")
            .field("project_id", &self.identity.project_id())
            .field("endpoints", &self.endpoints)
            .field("machine_client_id", &self.machine_client_id)
            .field("machine_client_secret", &self.machine_client_secret)
            .finish_non_exhaustive()
    }
}

fn missing_key_store() -> ProvisioningError {
    ProvisioningError::invalid_reference("no secret store configured for the management key")
}

fn connect(
    api: Option<Arc<dyn ManagementApi>>,
    identity: &ProjectIdentity,
    endpoints: &ResolvedEndpoints,
    config: ManagementClientConfig,
) -> Result<Arc<dyn ManagementApi>> {
    match api {
        Some(api) => Ok(api),
        None => Ok(Arc::new(DescopeManagementClient::new(
            endpoints.management_base_url.clone(),
            identity.project_id(),
            config,
        )?)),
    }
}

fn parse_callback_url(url: Option<&str>) -> Result<Url> {
    let raw = url.unwrap_or(DEFAULT_CALLBACK_URL);
    let parsed = Url::parse(raw).map_err(|e| {
        ProvisioningError::invalid_request(format!("invalid control plane callback URL '{raw}': {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProvisioningError::invalid_request(format!(
            "control plane callback URL must be http or https, got '{raw}'"
        )));
    }
    Ok(parsed)
}

fn client_credentials(outcome: &ReconcileOutcome) -> Result<(String, SecretRef)> {
    let client_id = outcome
        .attribute(ATTR_CLIENT_ID)
        .ok_or_else(|| ProvisioningError::upstream_rejected("machine client has no ClientId"))?;
    let secret = outcome
        .attribute(ATTR_CLIENT_SECRET)
        .ok_or_else(|| ProvisioningError::upstream_rejected("machine client has no ClientSecret"))?;
    Ok((client_id.to_string(), SecretRef::bind(secret)?))
}
