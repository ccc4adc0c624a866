//! Descope management API.
//!
//! [`ManagementApi`] is the seam between the provisioning handler and the
//! upstream identity platform. [`DescopeManagementClient`] is the HTTP
//! implementation. The management key is passed per call so that it lives
//! only as long as the invocation that resolved it.

mod client;

pub use client::{DescopeManagementClient, ManagementClientConfig};

use async_trait::async_trait;
use descope_auth_core::{Result, SecretValue};
use serde::{Deserialize, Serialize};

/// A Descope access key (machine client) as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl AccessKey {
    /// The client id used in the client-credentials flow.
    ///
    /// Older projects return no separate client id; the key id is used then.
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(&self.id)
    }
}

/// A freshly created access key together with its one-time cleartext.
#[derive(Debug, Clone)]
pub struct IssuedAccessKey {
    pub key: AccessKey,
    pub cleartext: SecretValue,
}

/// Fields sent when creating or updating an access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyDraft {
    pub name: String,
    pub description: Option<String>,
    pub role_names: Vec<String>,
}

/// A Descope user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescopeUser {
    pub user_id: String,
    #[serde(default)]
    pub login_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_names: Vec<String>,
}

impl DescopeUser {
    pub fn primary_login_id(&self) -> Option<&str> {
        self.login_ids.first().map(String::as_str)
    }
}

/// Fields sent when creating or updating a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDraft {
    pub login_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Enabled,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

/// Operations the adapter needs from the Descope management API.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    async fn create_access_key(
        &self,
        key: &SecretValue,
        draft: &AccessKeyDraft,
    ) -> Result<IssuedAccessKey>;

    async fn update_access_key(
        &self,
        key: &SecretValue,
        id: &str,
        draft: &AccessKeyDraft,
    ) -> Result<AccessKey>;

    /// # Errors
    ///
    /// `NotFound` when no key with that id exists.
    async fn delete_access_key(&self, key: &SecretValue, id: &str) -> Result<()>;

    async fn search_access_keys(&self, key: &SecretValue) -> Result<Vec<AccessKey>>;

    /// # Errors
    ///
    /// `UpstreamRejected` when a user with that login id already exists.
    async fn create_user(&self, key: &SecretValue, draft: &UserDraft) -> Result<DescopeUser>;

    async fn update_user(&self, key: &SecretValue, draft: &UserDraft) -> Result<DescopeUser>;

    /// # Errors
    ///
    /// `NotFound` when no user with that login id exists.
    async fn delete_user(&self, key: &SecretValue, login_id: &str) -> Result<()>;

    async fn load_user(&self, key: &SecretValue, login_id: &str) -> Result<DescopeUser>;

    /// One page of users, `page` starting at 0.
    async fn search_users(
        &self,
        key: &SecretValue,
        limit: u32,
        page: u32,
    ) -> Result<Vec<DescopeUser>>;

    async fn set_user_status(
        &self,
        key: &SecretValue,
        login_id: &str,
        status: UserStatus,
    ) -> Result<DescopeUser>;
}
