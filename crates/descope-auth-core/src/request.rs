//! Typed managed-object requests and handler results.

use std::collections::BTreeMap;

use crate::error::{ProvisioningError, Result};
use crate::lifecycle::{LifecycleOperation, ObjectKind, ResourceProperties};
use crate::secret::SecretValue;

/// Issued client id of a machine client.
pub const ATTR_CLIENT_ID: &str = "ClientId";
/// Issued client secret (a reference once it leaves the handler).
pub const ATTR_CLIENT_SECRET: &str = "ClientSecret";
/// Issued user id of an admin user.
pub const ATTR_USER_ID: &str = "UserId";
/// Login id of an admin user.
pub const ATTR_LOGIN_ID: &str = "LoginId";

/// A client-credentials application (Descope access key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineClientSpec {
    pub name: String,
    pub description: Option<String>,
}

/// An administrative user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUserSpec {
    /// Used as the login id.
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedObject {
    MachineClient(MachineClientSpec),
    AdminUser(AdminUserSpec),
}

impl ManagedObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::MachineClient(_) => ObjectKind::MachineClient,
            Self::AdminUser(_) => ObjectKind::AdminUser,
        }
    }

    /// Validate loosely typed properties into a typed object.
    pub fn from_properties(kind: ObjectKind, props: &ResourceProperties) -> Result<Self> {
        let name = required(props.name.as_deref(), "Name", kind)?;
        match kind {
            ObjectKind::MachineClient => Ok(Self::MachineClient(MachineClientSpec {
                name,
                description: non_blank(props.description.as_deref()),
            })),
            ObjectKind::AdminUser => {
                let email = required(props.email.as_deref(), "Email", kind)?;
                if !looks_like_email(&email) {
                    return Err(ProvisioningError::invalid_request(format!(
                        "Email '{email}' is not a valid address for {kind}"
                    )));
                }
                Ok(Self::AdminUser(AdminUserSpec {
                    name,
                    email,
                    role: non_blank(props.role.as_deref()),
                    display_name: non_blank(props.display_name.as_deref()),
                }))
            }
        }
    }
}

/// A validated request for exactly one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedObjectRequest {
    Create(ManagedObject),
    Update {
        physical_id: String,
        object: ManagedObject,
    },
    Delete {
        kind: ObjectKind,
        physical_id: String,
    },
}

impl ManagedObjectRequest {
    /// Build a typed request from a lifecycle operation.
    ///
    /// Create and Update need the kind's required fields; Update and Delete
    /// need the physical id of the existing object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when a required field or the physical id is missing.
    pub fn validate(
        kind: ObjectKind,
        operation: LifecycleOperation,
        physical_id: Option<&str>,
        props: &ResourceProperties,
    ) -> Result<Self> {
        match operation {
            LifecycleOperation::Create => Ok(Self::Create(ManagedObject::from_properties(
                kind, props,
            )?)),
            LifecycleOperation::Update => Ok(Self::Update {
                physical_id: required_physical_id(physical_id, operation, kind)?,
                object: ManagedObject::from_properties(kind, props)?,
            }),
            LifecycleOperation::Delete => Ok(Self::Delete {
                kind,
                physical_id: required_physical_id(physical_id, operation, kind)?,
            }),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Create(object) | Self::Update { object, .. } => object.kind(),
            Self::Delete { kind, .. } => *kind,
        }
    }

    pub fn operation(&self) -> LifecycleOperation {
        match self {
            Self::Create(_) => LifecycleOperation::Create,
            Self::Update { .. } => LifecycleOperation::Update,
            Self::Delete { .. } => LifecycleOperation::Delete,
        }
    }
}

/// What the handler produced for one request.
///
/// Secret attributes are kept apart from plain attributes so they can be
/// moved into a secret store before anything is published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedObjectResult {
    pub physical_id: String,
    pub attributes: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, SecretValue>,
}

impl ManagedObjectResult {
    pub fn new(physical_id: impl Into<String>) -> Self {
        Self {
            physical_id: physical_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_secret(mut self, key: impl Into<String>, value: SecretValue) -> Self {
        self.secrets.insert(key.into(), value);
        self
    }
}

fn required(value: Option<&str>, field: &str, kind: ObjectKind) -> Result<String> {
    non_blank(value)
        .ok_or_else(|| ProvisioningError::invalid_request(format!("{field} is required for {kind}")))
}

fn required_physical_id(
    physical_id: Option<&str>,
    operation: LifecycleOperation,
    kind: ObjectKind,
) -> Result<String> {
    non_blank(physical_id).ok_or_else(|| {
        ProvisioningError::invalid_request(format!(
            "{operation} of {kind} requires an existing physical id"
        ))
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_admin_user_requires_email() {
        let props = ResourceProperties {
            name: Some("admin".into()),
            ..Default::default()
        };
        let err = ManagedObjectRequest::validate(
            ObjectKind::AdminUser,
            LifecycleOperation::Create,
            None,
            &props,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(err.message.contains("Email"));
    }

    #[test]
    fn test_admin_user_rejects_malformed_email() {
        let props = ResourceProperties::admin_user("admin", "not-an-email", None, None);
        assert!(
            ManagedObject::from_properties(ObjectKind::AdminUser, &props).is_err()
        );
    }

    #[test]
    fn test_machine_client_requires_name() {
        let props = ResourceProperties {
            description: Some("no name".into()),
            ..Default::default()
        };
        let err = ManagedObject::from_properties(ObjectKind::MachineClient, &props).unwrap_err();
        assert!(err.message.contains("Name"));
    }

    #[test]
    fn test_blank_optionals_are_dropped() {
        let props = ResourceProperties::admin_user(
            " admin ",
            "admin@example.com",
            Some("  ".into()),
            Some("Admin".into()),
        );
        let object = ManagedObject::from_properties(ObjectKind::AdminUser, &props).unwrap();
        assert_eq!(
            object,
            ManagedObject::AdminUser(AdminUserSpec {
                name: "admin".into(),
                email: "admin@example.com".into(),
                role: None,
                display_name: Some("Admin".into()),
            })
        );
    }

    #[test]
    fn test_update_and_delete_need_physical_id() {
        let props = ResourceProperties::machine_client("key", None);
        assert!(
            ManagedObjectRequest::validate(
                ObjectKind::MachineClient,
                LifecycleOperation::Update,
                None,
                &props
            )
            .is_err()
        );
        let delete = ManagedObjectRequest::validate(
            ObjectKind::MachineClient,
            LifecycleOperation::Delete,
            Some("K1"),
            &ResourceProperties::default(),
        )
        .unwrap();
        assert_eq!(delete.operation(), LifecycleOperation::Delete);
        assert_eq!(delete.kind(), ObjectKind::MachineClient);
    }

    #[test]
    fn test_result_debug_hides_secrets() {
        let result = ManagedObjectResult::new("K1")
            .with_attribute(ATTR_CLIENT_ID, "C1")
            .with_secret(ATTR_CLIENT_SECRET, SecretValue::new("top-secret"));
        let debug = format!("{result:?}");
        assert!(debug.contains("C1"));
        assert!(!debug.contains("top-secret"));
    }
}
