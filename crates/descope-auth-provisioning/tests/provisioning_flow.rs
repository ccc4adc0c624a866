//! End-to-end provisioning against a mocked Descope management API.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use descope_auth_core::{
    LifecycleEvent, LifecycleOperation, ObjectKind, ResourceProperties, ResponseStatus,
};
use descope_auth_provisioning::{
    AdminUserProps, DescopeAuth, DescopeAuthProps, DescopeManagementClient, InMemoryResourceStore,
    InMemorySecretStore, ManagementClientConfig, ReconcileStatus, RedeliveryPolicy, SecretStore,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "P1234567890123456789012345678901";
const KEY_NAME: &str = "/descope/management-key";
const MGMT_KEY: &str = "K-mgmt-plaintext";
const CLIENT_SECRET: &str = "issued-client-secret-value";

fn client(server: &MockServer) -> Arc<DescopeManagementClient> {
    Arc::new(
        DescopeManagementClient::new(
            server.uri(),
            PROJECT,
            ManagementClientConfig::default().with_request_timeout(Duration::from_secs(2)),
        )
        .unwrap(),
    )
}

fn key_store() -> Arc<InMemorySecretStore> {
    Arc::new(InMemorySecretStore::new().with_secret(KEY_NAME, MGMT_KEY))
}

fn fast_redelivery() -> RedeliveryPolicy {
    RedeliveryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

async fn mount_access_key_create(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/accesskey/create"))
        .and(header(
            "authorization",
            format!("Bearer {PROJECT}:{MGMT_KEY}").as_str(),
        ))
        .and(body_partial_json(json!({
            "name": "SBT Auto-generated Access Key",
            "description": "Auto generated Access Key to be used with Client Credentials Flow",
            "expireTime": 0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": { "id": "K2default", "name": "SBT Auto-generated Access Key", "clientId": "C-default" },
            "cleartext": CLIENT_SECRET
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_construction_provisions_default_machine_client_once() {
    let server = MockServer::start().await;
    mount_access_key_create(&server, 1).await;

    let keys = key_store();
    let resources = Arc::new(InMemoryResourceStore::new());
    let api = client(&server);

    let first = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(keys.clone())
        .resource_store(resources.clone())
        .management_api(api.clone())
        .build()
        .await
        .unwrap();

    // A second construction over the same durable state replays the record
    let second = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(keys.clone())
        .resource_store(resources.clone())
        .management_api(api)
        .build()
        .await
        .unwrap();

    assert_eq!(first.machine_client_id(), "C-default");
    assert_eq!(first.outputs(), second.outputs());
    assert_eq!(first.management_base_url(), "https://api.1234.descope.com");
    assert_eq!(
        first.token_endpoint(),
        "https://api.1234.descope.com/oauth2/v1/token"
    );
    assert_eq!(
        first.well_known_url(),
        "https://api.1234.descope.com/.well-known/openid-configuration"
    );

    // The vaulted value is reachable only through a grant
    keys.grant_read(first.machine_client_secret(), "control-plane")
        .await
        .unwrap();
    let vaulted = keys
        .resolve(first.machine_client_secret(), "control-plane")
        .await
        .unwrap();
    assert_eq!(vaulted.expose(), CLIENT_SECRET);
}

#[tokio::test]
async fn test_transient_failures_are_redelivered_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/accesskey/create"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_access_key_create(&server, 1).await;

    let auth = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(key_store())
        .management_api(client(&server))
        .redelivery(fast_redelivery())
        .build()
        .await
        .unwrap();

    assert_eq!(auth.machine_client_id(), "C-default");
}

#[tokio::test]
async fn test_rejected_request_halts_construction_with_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/accesskey/create"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "E011003",
            "errorDescription": "Request is invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(key_store())
        .management_api(client(&server))
        .redelivery(fast_redelivery())
        .build()
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert!(err.to_string().starts_with("UpstreamRejected: "));
    assert!(err.to_string().contains("E011003"));
}

#[tokio::test]
async fn test_admin_user_without_email_makes_no_outbound_call() {
    let server = MockServer::start().await;
    mount_access_key_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/user/create"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(key_store())
        .management_api(client(&server))
        .build()
        .await
        .unwrap();

    let event = LifecycleEvent::new(
        LifecycleOperation::Create,
        ObjectKind::AdminUser,
        "req-1",
        "AdminUser-ops",
        ResourceProperties {
            name: Some("ops-admin".to_string()),
            ..Default::default()
        },
    );
    let response = auth.handle_event(&event).await;

    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(!response.retryable);
    assert!(
        response
            .reason
            .as_deref()
            .unwrap()
            .starts_with("InvalidRequest: ")
    );
}

#[tokio::test]
async fn test_additional_admin_user_and_teardown() {
    let server = MockServer::start().await;
    mount_access_key_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/user/create"))
        .and(body_partial_json(json!({
            "loginId": "ops-admin",
            "email": "ops@example.com",
            "displayName": "Ops Admin",
            "roleNames": ["Tenant Admin"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "userId": "U2ops", "loginIds": ["ops-admin"], "email": "ops@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/user/delete"))
        .and(body_partial_json(json!({ "loginId": "ops-admin" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/mgmt/user/delete"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "E062108",
            "errorDescription": "User not found"
        })))
        .mount(&server)
        .await;

    let auth = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(key_store())
        .management_api(client(&server))
        .build()
        .await
        .unwrap();

    let created = auth
        .create_additional_admin_user(
            "ops",
            AdminUserProps {
                name: "ops-admin".to_string(),
                email: "ops@example.com".to_string(),
                role: Some("Tenant Admin".to_string()),
                display_name: Some("Ops Admin".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.status, ReconcileStatus::Created);
    assert_eq!(created.attribute("UserId"), Some("U2ops"));

    let delete = LifecycleEvent::new(
        LifecycleOperation::Delete,
        ObjectKind::AdminUser,
        "req-2",
        "AdminUser-ops",
        ResourceProperties::default(),
    )
    .with_prior_physical_id("ops-admin");

    let first = auth.handle_event(&delete).await;
    assert_eq!(first.status, ResponseStatus::Success);

    // Redelivered after the user is gone upstream
    let second = auth.handle_event(&delete).await;
    assert_eq!(second.status, ResponseStatus::Success);
    assert_eq!(second.physical_resource_id.as_deref(), Some("ops-admin"));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_secrets_never_reach_logs() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            "descope_auth_provisioning=trace,descope_auth_core=trace,provisioning_flow=trace",
        ))
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let server = MockServer::start().await;
    mount_access_key_create(&server, 1).await;

    let auth = DescopeAuth::builder(DescopeAuthProps::new(PROJECT, KEY_NAME))
        .key_store(key_store())
        .management_api(client(&server))
        .build()
        .await
        .unwrap();
    tracing::info!(adapter = ?auth, "constructed");

    let captured = logs.contents();
    assert!(captured.contains("default machine client ready"));
    assert!(captured.contains("C-default"));
    assert!(!captured.contains(CLIENT_SECRET));
    assert!(!captured.contains(MGMT_KEY));
}
