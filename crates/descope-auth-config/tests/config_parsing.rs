use std::{env, fs};

use descope_auth_config::{ConfigError, Keyring, SecretsBackend, loader::load_config};
use descope_auth_core::SecretValue;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("descope-auth.toml");

    let toml_content = r#"
[descope]
project_id = "P1234567890123456789012345678901"
client_secret_parameter_name = "/descope/management-key"
control_plane_callback_url = "https://control-plane.example.com/callback"
set_api_gw_scopes = false

[management]
request_timeout_ms = 2500

[secrets]
backend = "extension"
extension_port = 2773
vault_prefix = "/tenants/acme"

[state]
path = "state/resources.json"

[handler]
identity = "provisioner"

[handler.extension_layers]
us-east-1 = "arn:aws:lambda:us-east-1:177933569100:layer:AWS-Parameters-and-Secrets-Lambda-Extension:11"

[redelivery]
max_attempts = 5

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.descope.project_id, "P1234567890123456789012345678901");
    assert!(!cfg.descope.set_api_gw_scopes);
    assert_eq!(cfg.management.request_timeout_ms, 2500);
    assert_eq!(cfg.secrets.backend, SecretsBackend::Extension);
    assert_eq!(cfg.secrets.vault_prefix, "/tenants/acme");
    assert_eq!(cfg.handler.identity, "provisioner");
    assert_eq!(cfg.redelivery.max_attempts, 5);
    assert!(
        cfg.handler
            .extension_layers
            .get("us-east-1")
            .is_some_and(|arn| arn.ends_with(":11"))
    );
    // Untouched sections keep their defaults
    assert_eq!(cfg.domain.domain_suffix, "descope.com");

    // 2) Env override should win over file
    unsafe {
        env::set_var("DESCOPE_AUTH__MANAGEMENT__REQUEST_TIMEOUT_MS", "900");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.management.request_timeout_ms, 900);
    unsafe {
        env::remove_var("DESCOPE_AUTH__MANAGEMENT__REQUEST_TIMEOUT_MS");
    }

    // 3) A malformed domain override is rejected
    let bad = toml_content.replace(
        "set_api_gw_scopes = false",
        "set_api_gw_scopes = false\ndomain = \"http://api.example.com/\"",
    );
    fs::write(&path, bad).expect("write toml");
    let err = load_config(path.to_str()).expect_err("domain must be https without trailing slash");
    assert!(err.to_string().contains("descope.domain"));

    // 4) Missing file is an error, not a silent default
    assert!(load_config(dir.path().join("missing.toml").to_str()).is_err());
}

#[test]
fn keyring_from_env_seals_and_opens() {
    let var = "DESCOPE_AUTH_TEST_SEALING_KEY";
    unsafe {
        env::remove_var(var);
    }
    assert!(Keyring::from_env(var).expect("unset is not an error").is_none());

    unsafe {
        env::set_var(var, "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff");
    }
    let keyring = Keyring::from_env(var).expect("valid key").expect("key present");
    let sealed = keyring.seal(&SecretValue::new("K-mgmt")).expect("seal");
    assert_eq!(keyring.open(&sealed).expect("open").expose(), "K-mgmt");
    unsafe {
        env::remove_var(var);
    }
}

#[test]
fn load_failures_are_classified() {
    let dir = tempfile::tempdir().expect("tmp dir");

    let missing = dir.path().join("absent.toml");
    let err = load_config(missing.to_str()).expect_err("missing file");
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("not found")));

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[descope\nproject_id = ").expect("write toml");
    let err = load_config(broken.to_str()).expect_err("unparseable file");
    assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
}
