use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use descope_auth_config::SecretsSettings;
use descope_auth_core::{ProvisioningError, Result, SecretRef, SecretValue};
use serde::Deserialize;

use super::SecretStore;

const TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterEnvelope {
    parameter: Parameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

/// Read-only store served by the parameters-and-secrets extension running
/// next to the handler (`http://localhost:{port}/systemsmanager/parameters/get`).
///
/// Grants are held in process; the deployment itself decides what the
/// extension may decrypt.
pub struct ParametersExtensionStore {
    http: reqwest::Client,
    endpoint: String,
    session_token: Option<SecretValue>,
    grants: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl ParametersExtensionStore {
    /// `endpoint` is the extension root, e.g. `http://localhost:2773`.
    pub fn new(
        endpoint: impl Into<String>,
        session_token: Option<SecretValue>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProvisioningError::upstream_unavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            session_token,
            grants: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_settings(settings: &SecretsSettings, timeout: Duration) -> Result<Self> {
        let token = std::env::var(&settings.session_token_env)
            .ok()
            .map(SecretValue::new);
        Self::new(
            format!("http://localhost:{}", settings.extension_port),
            token,
            timeout,
        )
    }

    fn is_granted(&self, secret: &SecretRef, grantee: &str) -> bool {
        self.grants
            .lock()
            .map(|g| g.get(secret.name()).is_some_and(|s| s.contains(grantee)))
            .unwrap_or(false)
    }

    async fn fetch(&self, secret: &SecretRef) -> Result<SecretValue> {
        let url = format!("{}/systemsmanager/parameters/get", self.endpoint);
        let mut request = self
            .http
            .get(&url)
            .query(&[("name", secret.name()), ("withDecryption", "true")]);
        if let Some(token) = &self.session_token {
            request = request.header(TOKEN_HEADER, token.expose());
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(secret = %secret, error = %e, "parameters extension unreachable");
            ProvisioningError::upstream_unavailable(format!("parameters extension: {e}"))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(ProvisioningError::invalid_reference(format!(
                "parameter '{secret}' does not exist"
            )));
        }
        if !status.is_success() {
            return Err(ProvisioningError::upstream_unavailable(format!(
                "parameters extension returned {status} for '{secret}'"
            )));
        }

        let envelope: ParameterEnvelope = response.json().await.map_err(|e| {
            ProvisioningError::upstream_unavailable(format!(
                "unreadable parameter response for '{secret}': {e}"
            ))
        })?;
        Ok(SecretValue::new(envelope.parameter.value))
    }
}

#[async_trait]
impl SecretStore for ParametersExtensionStore {
    fn backend(&self) -> &'static str {
        "extension"
    }

    async fn grant_read(&self, secret: &SecretRef, grantee: &str) -> Result<()> {
        let mut grants = self
            .grants
            .lock()
            .map_err(|_| ProvisioningError::storage("grant table poisoned"))?;
        grants
            .entry(secret.name().to_string())
            .or_default()
            .insert(grantee.to_string());
        Ok(())
    }

    async fn resolve(&self, secret: &SecretRef, grantee: &str) -> Result<SecretValue> {
        if !self.is_granted(secret, grantee) {
            return Err(ProvisioningError::access_denied(format!(
                "'{grantee}' holds no read grant on secret '{secret}'"
            )));
        }
        self.fetch(secret).await
    }

    async fn put(&self, secret: &SecretRef, _value: SecretValue) -> Result<()> {
        Err(ProvisioningError::storage(format!(
            "parameters extension is read-only, cannot store '{secret}'"
        )))
    }

    async fn remove(&self, secret: &SecretRef) -> Result<bool> {
        Err(ProvisioningError::storage(format!(
            "parameters extension is read-only, cannot remove '{secret}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descope_auth_core::ErrorKind;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key_ref() -> SecretRef {
        SecretRef::bind("/descope/management-key").unwrap()
    }

    async fn store(server: &MockServer) -> ParametersExtensionStore {
        let store = ParametersExtensionStore::new(
            server.uri(),
            Some(SecretValue::new("session-token")),
            Duration::from_secs(2),
        )
        .unwrap();
        store.grant_read(&key_ref(), "handler").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_resolves_parameter_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/systemsmanager/parameters/get"))
            .and(query_param("name", "/descope/management-key"))
            .and(query_param("withDecryption", "true"))
            .and(header(TOKEN_HEADER, "session-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Parameter": { "Name": "/descope/management-key", "Value": "K-123" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = store(&server).await.resolve(&key_ref(), "handler").await.unwrap();
        assert_eq!(value.expose(), "K-123");
    }

    #[tokio::test]
    async fn test_missing_parameter_is_invalid_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .resolve(&key_ref(), "handler")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidReference);
    }

    #[tokio::test]
    async fn test_ungranted_caller_never_reaches_extension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .resolve(&key_ref(), "intruder")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_is_read_only() {
        let server = MockServer::start().await;
        let store = store(&server).await;
        assert!(store.put(&key_ref(), SecretValue::new("x")).await.is_err());
        assert!(store.remove(&key_ref()).await.is_err());
    }
}
