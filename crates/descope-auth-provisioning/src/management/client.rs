use std::time::Duration;

use async_trait::async_trait;
use descope_auth_config::ManagementSettings;
use descope_auth_core::{ProvisioningError, Result, SecretValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    AccessKey, AccessKeyDraft, DescopeUser, IssuedAccessKey, ManagementApi, UserDraft, UserStatus,
};

const ACCESS_KEY_CREATE: &str = "/v1/mgmt/accesskey/create";
const ACCESS_KEY_UPDATE: &str = "/v1/mgmt/accesskey/update";
const ACCESS_KEY_DELETE: &str = "/v1/mgmt/accesskey/delete";
const ACCESS_KEY_SEARCH: &str = "/v1/mgmt/accesskey/search";
const USER_CREATE: &str = "/v1/mgmt/user/create";
const USER_UPDATE: &str = "/v1/mgmt/user/update";
const USER_DELETE: &str = "/v1/mgmt/user/delete";
const USER_LOAD: &str = "/v1/mgmt/user";
const USER_SEARCH: &str = "/v1/mgmt/user/search";
const USER_UPDATE_STATUS: &str = "/v1/mgmt/user/update/status";

/// Configuration for the management API client.
#[derive(Debug, Clone)]
pub struct ManagementClientConfig {
    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,
}

impl Default for ManagementClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
        }
    }
}

impl ManagementClientConfig {
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }
}

impl From<&ManagementSettings> for ManagementClientConfig {
    fn from(settings: &ManagementSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout(),
            max_response_size: settings.max_response_size,
        }
    }
}

/// Error body returned by the management API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Why a call failed, before it is mapped onto the error taxonomy.
#[derive(Debug)]
enum ApiFailure {
    Transport(String),
    Status {
        status: StatusCode,
        code: Option<String>,
        description: String,
    },
    Malformed(String),
}

impl ApiFailure {
    fn transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }

    fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        let description = [parsed.error_description, parsed.error_message]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(": ");
        Self::Status {
            status,
            code: parsed.error_code,
            description,
        }
    }

    fn is_conflict(&self) -> bool {
        match self {
            Self::Status {
                status,
                description,
                ..
            } => {
                *status == StatusCode::CONFLICT
                    || (status.is_client_error()
                        && description.to_lowercase().contains("already exists"))
            }
            _ => false,
        }
    }

    fn into_error(self, action: &str) -> ProvisioningError {
        match self {
            Self::Transport(detail) => {
                ProvisioningError::upstream_unavailable(format!("{action} failed: {detail}"))
            }
            Self::Malformed(detail) => ProvisioningError::upstream_rejected(format!(
                "{action} returned an unexpected response: {detail}"
            )),
            Self::Status {
                status,
                code,
                description,
            } => {
                let detail = match (code, description.is_empty()) {
                    (Some(code), false) => format!("{status} ({code}: {description})"),
                    (Some(code), true) => format!("{status} ({code})"),
                    (None, false) => format!("{status} ({description})"),
                    (None, true) => status.to_string(),
                };
                let message = format!("{action} failed: {detail}");

                if status.is_server_error()
                    || status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::UNAUTHORIZED
                    || status == StatusCode::FORBIDDEN
                {
                    ProvisioningError::upstream_unavailable(message)
                } else if status == StatusCode::NOT_FOUND
                    || (status == StatusCode::BAD_REQUEST
                        && description.to_lowercase().contains("not found"))
                {
                    ProvisioningError::not_found(message)
                } else {
                    ProvisioningError::upstream_rejected(message)
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct KeyEnvelope {
    key: AccessKey,
}

#[derive(Deserialize)]
struct IssuedKeyEnvelope {
    key: AccessKey,
    cleartext: String,
}

#[derive(Deserialize)]
struct KeysEnvelope {
    #[serde(default)]
    keys: Vec<AccessKey>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: DescopeUser,
}

#[derive(Deserialize)]
struct UsersEnvelope {
    #[serde(default)]
    users: Vec<DescopeUser>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserBody<'a> {
    login_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    role_names: &'a [String],
}

impl<'a> From<&'a UserDraft> for UserBody<'a> {
    fn from(draft: &'a UserDraft) -> Self {
        Self {
            login_id: &draft.login_id,
            email: draft.email.as_deref(),
            display_name: draft.display_name.as_deref(),
            role_names: &draft.role_names,
        }
    }
}

/// HTTP client for the Descope management API.
///
/// Every call authenticates with `Bearer {projectId}:{managementKey}` and is
/// bounded by the configured timeout and response size.
pub struct DescopeManagementClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    config: ManagementClientConfig,
}

impl DescopeManagementClient {
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        config: ManagementClientConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ProvisioningError::upstream_unavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorization(&self, key: &SecretValue) -> String {
        format!("{}:{}", self.project_id, key.expose())
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> std::result::Result<Vec<u8>, ApiFailure> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(path, error = %e, "management API unreachable");
            ApiFailure::transport(&e)
        })?;

        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "management API call");

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(ApiFailure::Malformed(format!(
                "response exceeds maximum size of {} bytes",
                self.config.max_response_size
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiFailure::transport(&e))?;
        if body.len() > self.config.max_response_size {
            return Err(ApiFailure::Malformed(format!(
                "response exceeds maximum size of {} bytes",
                self.config.max_response_size
            )));
        }

        if !status.is_success() {
            return Err(ApiFailure::from_status(status, &body));
        }
        Ok(body.to_vec())
    }

    async fn post_raw<B: Serialize + ?Sized>(
        &self,
        key: &SecretValue,
        path: &str,
        body: &B,
    ) -> std::result::Result<Vec<u8>, ApiFailure> {
        let request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.authorization(key))
            .json(body);
        self.execute(request, path).await
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        key: &SecretValue,
        path: &str,
        body: &B,
    ) -> std::result::Result<R, ApiFailure> {
        let bytes = self.post_raw(key, path, body).await?;
        decode(&bytes)
    }

    async fn get<R: DeserializeOwned>(
        &self,
        key: &SecretValue,
        path: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<R, ApiFailure> {
        let request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(self.authorization(key))
            .query(query);
        let bytes = self.execute(request, path).await?;
        decode(&bytes)
    }
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<R, ApiFailure> {
    serde_json::from_slice(bytes).map_err(|e| ApiFailure::Malformed(e.to_string()))
}

#[async_trait]
impl ManagementApi for DescopeManagementClient {
    async fn create_access_key(
        &self,
        key: &SecretValue,
        draft: &AccessKeyDraft,
    ) -> Result<IssuedAccessKey> {
        let body = json!({
            "name": draft.name,
            "description": draft.description.as_deref().unwrap_or_default(),
            "expireTime": 0,
            "roleNames": draft.role_names,
        });
        let issued: IssuedKeyEnvelope = self
            .post(key, ACCESS_KEY_CREATE, &body)
            .await
            .map_err(|f| f.into_error("create access key"))?;

        if issued.cleartext.is_empty() {
            return Err(ProvisioningError::upstream_rejected(
                "create access key returned no client secret",
            ));
        }

        Ok(IssuedAccessKey {
            key: issued.key,
            cleartext: SecretValue::new(issued.cleartext),
        })
    }

    async fn update_access_key(
        &self,
        key: &SecretValue,
        id: &str,
        draft: &AccessKeyDraft,
    ) -> Result<AccessKey> {
        let body = json!({
            "id": id,
            "name": draft.name,
            "description": draft.description.as_deref().unwrap_or_default(),
        });
        let envelope: KeyEnvelope = self
            .post(key, ACCESS_KEY_UPDATE, &body)
            .await
            .map_err(|f| f.into_error("update access key"))?;
        Ok(envelope.key)
    }

    async fn delete_access_key(&self, key: &SecretValue, id: &str) -> Result<()> {
        self.post_raw(key, ACCESS_KEY_DELETE, &json!({ "id": id }))
            .await
            .map_err(|f| f.into_error("delete access key"))?;
        Ok(())
    }

    async fn search_access_keys(&self, key: &SecretValue) -> Result<Vec<AccessKey>> {
        let envelope: KeysEnvelope = self
            .post(key, ACCESS_KEY_SEARCH, &json!({}))
            .await
            .map_err(|f| f.into_error("search access keys"))?;
        Ok(envelope.keys)
    }

    async fn create_user(&self, key: &SecretValue, draft: &UserDraft) -> Result<DescopeUser> {
        match self
            .post::<_, UserEnvelope>(key, USER_CREATE, &UserBody::from(draft))
            .await
        {
            Ok(envelope) => Ok(envelope.user),
            Err(failure) if failure.is_conflict() => {
                tracing::warn!(login_id = %draft.login_id, "user already exists upstream");
                Err(ProvisioningError::upstream_rejected(format!(
                    "create user failed: '{}' already exists and was not created here",
                    draft.login_id
                )))
            }
            Err(failure) => Err(failure.into_error("create user")),
        }
    }

    async fn update_user(&self, key: &SecretValue, draft: &UserDraft) -> Result<DescopeUser> {
        let envelope: UserEnvelope = self
            .post(key, USER_UPDATE, &UserBody::from(draft))
            .await
            .map_err(|f| f.into_error("update user"))?;
        Ok(envelope.user)
    }

    async fn delete_user(&self, key: &SecretValue, login_id: &str) -> Result<()> {
        self.post_raw(key, USER_DELETE, &json!({ "loginId": login_id }))
            .await
            .map_err(|f| f.into_error("delete user"))?;
        Ok(())
    }

    async fn load_user(&self, key: &SecretValue, login_id: &str) -> Result<DescopeUser> {
        let envelope: UserEnvelope = self
            .get(key, USER_LOAD, &[("loginId", login_id)])
            .await
            .map_err(|f| f.into_error("load user"))?;
        Ok(envelope.user)
    }

    async fn search_users(
        &self,
        key: &SecretValue,
        limit: u32,
        page: u32,
    ) -> Result<Vec<DescopeUser>> {
        let envelope: UsersEnvelope = self
            .post(key, USER_SEARCH, &json!({ "limit": limit, "page": page }))
            .await
            .map_err(|f| f.into_error("search users"))?;
        Ok(envelope.users)
    }

    async fn set_user_status(
        &self,
        key: &SecretValue,
        login_id: &str,
        status: UserStatus,
    ) -> Result<DescopeUser> {
        let body = json!({ "loginId": login_id, "status": status.as_str() });
        let envelope: UserEnvelope = self
            .post(key, USER_UPDATE_STATUS, &body)
            .await
            .map_err(|f| f.into_error("update user status"))?;
        Ok(envelope.user)
    }
}
