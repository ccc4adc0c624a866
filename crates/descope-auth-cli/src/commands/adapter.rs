use anyhow::{Context, Result};
use colored::Colorize;
use descope_auth_config::AppConfig;
use descope_auth_core::{LifecycleEvent, ProjectIdentity, ResolvedEndpoints};
use descope_auth_provisioning::AdminUserProps;
use uuid::Uuid;

use super::{build_adapter, connect_management, read_input};
use crate::cli::{AdminUserCreateArgs, MachineClientCreateArgs, OutputFormat};
use crate::output::{print_success, print_value};

pub fn endpoints(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let identity = ProjectIdentity::new(
        config.descope.project_id.clone(),
        config.descope.domain.clone(),
    )?;
    let endpoints = ResolvedEndpoints::resolve(&identity, &config.domain);
    print_value(&endpoints, format)
}

pub async fn provision(config: &AppConfig, grantees: &[String], format: OutputFormat) -> Result<()> {
    let auth = build_adapter(config).await?;
    for grantee in grantees {
        auth.grant_machine_client_secret(grantee)
            .await
            .with_context(|| format!("Failed to grant the machine client secret to {grantee}"))?;
        print_success(&format!(
            "Granted {} to {}",
            auth.machine_client_secret().name().cyan(),
            grantee.cyan()
        ));
    }
    print_value(&auth.outputs(), format)
}

pub async fn create_admin_user(
    config: &AppConfig,
    args: &AdminUserCreateArgs,
    format: OutputFormat,
) -> Result<()> {
    let auth = build_adapter(config).await?;
    let outcome = auth
        .create_additional_admin_user(
            &args.id,
            AdminUserProps {
                name: args.name.clone(),
                email: args.email.clone(),
                role: args.role.clone(),
                display_name: args.display_name.clone(),
            },
        )
        .await?;
    print_success(&format!(
        "{} {:?}",
        outcome.logical_id.cyan(),
        outcome.status
    ));
    print_value(&outcome, format)
}

pub async fn create_machine_client(
    config: &AppConfig,
    args: &MachineClientCreateArgs,
    format: OutputFormat,
) -> Result<()> {
    let auth = build_adapter(config).await?;
    let outcome = auth
        .create_machine_client(&args.id, args.name.clone(), args.description.clone())
        .await?;
    print_success(&format!(
        "{} {:?}",
        outcome.logical_id.cyan(),
        outcome.status
    ));
    print_value(&outcome, format)
}

/// Lists keys without touching the default machine client.
pub async fn list_machine_clients(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let keys = connect_management(config).await?.list_access_keys().await?;
    print_value(&keys, format)
}

/// Handle one event the way the host would deliver it. Fails after printing
/// the response when the response is FAILED.
pub async fn reconcile(config: &AppConfig, source: &str, format: OutputFormat) -> Result<()> {
    let event = parse_event(&read_input(source)?)?;
    let auth = build_adapter(config).await?;
    let response = auth.handle_event(&event).await;
    print_value(&response, format)?;
    if !response.is_success() {
        anyhow::bail!(
            "{} failed: {}",
            event.logical_resource_id,
            response.reason.as_deref().unwrap_or("no reason given")
        );
    }
    Ok(())
}

fn parse_event(raw: &str) -> Result<LifecycleEvent> {
    let mut event: LifecycleEvent = serde_json::from_str(raw).context("Invalid lifecycle event")?;
    if event.request_id.trim().is_empty() {
        event.request_id = Uuid::new_v4().to_string();
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use descope_auth_core::{LifecycleOperation, ObjectKind};

    #[test]
    fn test_parse_event_fills_missing_request_id() {
        let event = parse_event(
            r#"{
                "RequestType": "Create",
                "RequestId": "",
                "LogicalResourceId": "MachineClient-ci",
                "ResourceType": "Custom::DescopeMachineClient",
                "ResourceProperties": { "Name": "ci" }
            }"#,
        )
        .unwrap();

        assert_eq!(event.operation, LifecycleOperation::Create);
        assert_eq!(event.resource_type, ObjectKind::MachineClient);
        assert!(Uuid::parse_str(&event.request_id).is_ok());
    }

    #[test]
    fn test_parse_event_rejects_unknown_resource_type() {
        let err = parse_event(
            r#"{
                "RequestType": "Create",
                "RequestId": "r-1",
                "LogicalResourceId": "X",
                "ResourceType": "Custom::Other",
                "ResourceProperties": {}
            }"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid lifecycle event"));
    }

    #[test]
    fn test_endpoints_need_no_network() {
        let mut config = AppConfig::default();
        config.descope.project_id = "P1234567890123456789012345678901".to_string();
        config.descope.client_secret_parameter_name = "/descope/key".to_string();
        endpoints(&config, OutputFormat::Json).unwrap();
    }
}
