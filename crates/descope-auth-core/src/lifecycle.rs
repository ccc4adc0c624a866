//! Lifecycle event and response wire shapes.
//!
//! The declarative host delivers events at least once, using PascalCase keys:
//!
//! ```json
//! {
//!   "RequestType": "Create",
//!   "RequestId": "3f1c...",
//!   "LogicalResourceId": "MachineClient",
//!   "ResourceType": "Custom::DescopeMachineClient",
//!   "ResourceProperties": { "Name": "SBT Auto-generated Access Key" }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProvisioningError;

/// Lifecycle operation requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleOperation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "Create"),
            Self::Update => write!(f, "Update"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// Kind of externally managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    #[serde(rename = "Custom::DescopeMachineClient")]
    MachineClient,
    #[serde(rename = "Custom::DescopeAdminUser")]
    AdminUser,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MachineClient => write!(f, "MachineClient"),
            Self::AdminUser => write!(f, "AdminUser"),
        }
    }
}

/// Loosely typed properties as declared on the resource.
///
/// Validation into a typed request happens in the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "role")]
    pub role: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "Display Name"
    )]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResourceProperties {
    pub fn machine_client(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: Some(name.into()),
            description,
            ..Default::default()
        }
    }

    pub fn admin_user(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            role,
            display_name,
            description: None,
        }
    }
}

/// One lifecycle event for one declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    #[serde(rename = "RequestType")]
    pub operation: LifecycleOperation,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(
        rename = "PhysicalResourceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub prior_physical_id: Option<String>,
    pub resource_type: ObjectKind,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
}

impl LifecycleEvent {
    pub fn new(
        operation: LifecycleOperation,
        kind: ObjectKind,
        request_id: impl Into<String>,
        logical_resource_id: impl Into<String>,
        resource_properties: ResourceProperties,
    ) -> Self {
        Self {
            operation,
            request_id: request_id.into(),
            logical_resource_id: logical_resource_id.into(),
            prior_physical_id: None,
            resource_type: kind,
            resource_properties,
        }
    }

    #[must_use]
    pub fn with_prior_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.prior_physical_id = Some(physical_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Response handed back to the host for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleResponse {
    pub status: ResponseStatus,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

impl LifecycleResponse {
    pub fn success(
        event: &LifecycleEvent,
        physical_id: impl Into<String>,
        data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            status: ResponseStatus::Success,
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            physical_resource_id: Some(physical_id.into()),
            data,
            reason: None,
            retryable: false,
        }
    }

    /// Failure response; the reason is `<kind>: <message>`, unmodified.
    pub fn failure(event: &LifecycleEvent, error: &ProvisioningError) -> Self {
        Self {
            status: ResponseStatus::Failed,
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            physical_resource_id: error
                .physical_id
                .clone()
                .or_else(|| event.prior_physical_id.clone()),
            data: BTreeMap::new(),
            reason: Some(error.to_string()),
            retryable: error.is_retryable(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
