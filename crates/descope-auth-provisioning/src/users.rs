//! Day-2 user management over the management API.

use std::sync::Arc;

use descope_auth_core::{
    ManagedObject, ObjectKind, ProvisioningError, ResourceProperties, Result,
};

use crate::handler::ManagementKey;
use crate::management::{DescopeUser, ManagementApi, UserDraft, UserStatus};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIST_LIMIT: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub login_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none()
    }
}

/// Create, list, read, update, enable, disable and delete users with the
/// same management key the handler uses.
pub struct UserManagement {
    api: Arc<dyn ManagementApi>,
    key: ManagementKey,
}

impl UserManagement {
    pub fn new(api: Arc<dyn ManagementApi>, key: ManagementKey) -> Self {
        Self { api, key }
    }

    pub async fn create(&self, user: &NewUser) -> Result<DescopeUser> {
        let props = ResourceProperties::admin_user(
            user.login_id.clone(),
            user.email.clone(),
            user.role.clone(),
            user.display_name.clone(),
        );
        let ManagedObject::AdminUser(spec) =
            ManagedObject::from_properties(ObjectKind::AdminUser, &props)?
        else {
            return Err(ProvisioningError::invalid_request("expected an admin user"));
        };

        let key = self.key.resolve().await?;
        let created = self
            .api
            .create_user(
                &key,
                &UserDraft {
                    login_id: spec.name,
                    email: Some(spec.email),
                    display_name: spec.display_name,
                    role_names: spec.role.into_iter().collect(),
                },
            )
            .await?;
        tracing::info!(user_id = %created.user_id, "user created");
        Ok(created)
    }

    pub async fn list(&self, limit: Option<u32>, page: u32) -> Result<Vec<DescopeUser>> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIST_LIMIT);
        let key = self.key.resolve().await?;
        self.api.search_users(&key, limit, page).await
    }

    pub async fn get(&self, login_id: &str) -> Result<DescopeUser> {
        let login_id = required_login_id(login_id)?;
        let key = self.key.resolve().await?;
        self.api.load_user(&key, login_id).await
    }

    /// Change email and/or display name, keeping every other field.
    pub async fn update(&self, login_id: &str, changes: &UserChanges) -> Result<DescopeUser> {
        let login_id = required_login_id(login_id)?;
        if changes.is_empty() {
            return Err(ProvisioningError::invalid_request(
                "nothing to update: provide an email or a display name",
            ));
        }

        let key = self.key.resolve().await?;
        let current = self.api.load_user(&key, login_id).await?;
        let draft = UserDraft {
            login_id: login_id.to_string(),
            email: changes.email.clone().or(current.email),
            display_name: changes.display_name.clone().or(current.name),
            role_names: current.role_names,
        };
        self.api.update_user(&key, &draft).await
    }

    pub async fn enable(&self, login_id: &str) -> Result<DescopeUser> {
        self.set_status(login_id, UserStatus::Enabled).await
    }

    pub async fn disable(&self, login_id: &str) -> Result<DescopeUser> {
        self.set_status(login_id, UserStatus::Disabled).await
    }

    /// Returns `false` when the user did not exist.
    pub async fn delete(&self, login_id: &str) -> Result<bool> {
        let login_id = required_login_id(login_id)?;
        let key = self.key.resolve().await?;
        match self.api.delete_user(&key, login_id).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::info!(login_id, "user not found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn set_status(&self, login_id: &str, status: UserStatus) -> Result<DescopeUser> {
        let login_id = required_login_id(login_id)?;
        let key = self.key.resolve().await?;
        self.api.set_user_status(&key, login_id, status).await
    }
}

fn required_login_id(login_id: &str) -> Result<&str> {
    let trimmed = login_id.trim();
    if trimmed.is_empty() {
        return Err(ProvisioningError::invalid_request("login id is required"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::InMemorySecretStore;
    use crate::testing::RecordingApi;
    use descope_auth_core::{ErrorKind, SecretRef};

    async fn users(api: Arc<RecordingApi>) -> UserManagement {
        let store = Arc::new(InMemorySecretStore::new().with_secret("mk", "K"));
        let key = ManagementKey::new(store, SecretRef::bind("mk").unwrap(), "handler");
        key.grant().await.unwrap();
        UserManagement::new(api, key)
    }

    fn ops() -> NewUser {
        NewUser {
            login_id: "ops".to_string(),
            email: "ops@example.com".to_string(),
            display_name: Some("Ops".to_string()),
            role: None,
        }
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let api = Arc::new(RecordingApi::default());
        let users = users(api.clone()).await;

        let created = users.create(&ops()).await.unwrap();
        assert_eq!(created.primary_login_id(), Some("ops"));

        let updated = users
            .update(
                "ops",
                &UserChanges {
                    email: Some("ops2@example.com".to_string()),
                    display_name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email.as_deref(), Some("ops2@example.com"));
        assert_eq!(updated.name.as_deref(), Some("Ops"));

        let disabled = users.disable("ops").await.unwrap();
        assert_eq!(disabled.status.as_deref(), Some("disabled"));
        let enabled = users.enable("ops").await.unwrap();
        assert_eq!(enabled.status.as_deref(), Some("enabled"));

        assert!(users.delete("ops").await.unwrap());
        assert!(!users.delete("ops").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_defaults_to_ten() {
        let api = Arc::new(RecordingApi::default());
        let users = users(api.clone()).await;

        users.list(None, 0).await.unwrap();
        assert_eq!(api.calls(), vec!["search_users:10:0".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_calls() {
        let api = Arc::new(RecordingApi::default());
        let users = users(api.clone()).await;

        let err = users
            .create(&NewUser {
                email: "not-an-email".to_string(),
                ..ops()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);

        let err = users.update("ops", &UserChanges::default()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert_eq!(users.get("  ").await.unwrap_err().kind, ErrorKind::InvalidRequest);

        assert!(api.calls().is_empty());
    }
}
