//! In-process management API double for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use descope_auth_core::{ProvisioningError, Result, SecretValue};

use crate::management::{
    AccessKey, AccessKeyDraft, DescopeUser, IssuedAccessKey, ManagementApi, UserDraft, UserStatus,
};

#[derive(Default)]
struct State {
    calls: Vec<String>,
    next_id: u32,
    keys: BTreeMap<String, AccessKey>,
    users: BTreeMap<String, DescopeUser>,
    failures: Vec<ProvisioningError>,
}

/// Records every call and keeps access keys and users in memory.
#[derive(Default)]
pub struct RecordingApi {
    state: Mutex<State>,
}

impl RecordingApi {
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn key_count(&self) -> usize {
        self.state.lock().unwrap().keys.len()
    }

    /// Fail the next calls with these errors, in order.
    pub fn fail_with(&self, errors: Vec<ProvisioningError>) {
        self.state.lock().unwrap().failures = errors;
    }

    fn record(&self, call: String) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if !state.failures.is_empty() {
            return Err(state.failures.remove(0));
        }
        Ok(state)
    }
}

fn user_from(draft: &UserDraft, user_id: String) -> DescopeUser {
    DescopeUser {
        user_id,
        login_ids: vec![draft.login_id.clone()],
        email: draft.email.clone(),
        name: draft.display_name.clone(),
        status: Some(UserStatus::Enabled.as_str().to_string()),
        role_names: draft.role_names.clone(),
    }
}

#[async_trait]
impl ManagementApi for RecordingApi {
    async fn create_access_key(
        &self,
        _key: &SecretValue,
        draft: &AccessKeyDraft,
    ) -> Result<IssuedAccessKey> {
        let mut state = self.record(format!("create_access_key:{}", draft.name))?;
        state.next_id += 1;
        let n = state.next_id;
        let key = AccessKey {
            id: format!("K{n}"),
            name: draft.name.clone(),
            client_id: Some(format!("C{n}")),
            description: draft.description.clone(),
            status: Some("active".to_string()),
        };
        state.keys.insert(key.id.clone(), key.clone());
        Ok(IssuedAccessKey {
            key,
            cleartext: SecretValue::new(format!("cleartext-{n}")),
        })
    }

    async fn update_access_key(
        &self,
        _key: &SecretValue,
        id: &str,
        draft: &AccessKeyDraft,
    ) -> Result<AccessKey> {
        let mut state = self.record(format!("update_access_key:{id}"))?;
        let key = state
            .keys
            .get_mut(id)
            .ok_or_else(|| ProvisioningError::not_found(format!("access key {id}")))?;
        key.name = draft.name.clone();
        key.description = draft.description.clone();
        Ok(key.clone())
    }

    async fn delete_access_key(&self, _key: &SecretValue, id: &str) -> Result<()> {
        let mut state = self.record(format!("delete_access_key:{id}"))?;
        state
            .keys
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ProvisioningError::not_found(format!("access key {id}")))
    }

    async fn search_access_keys(&self, _key: &SecretValue) -> Result<Vec<AccessKey>> {
        let state = self.record("search_access_keys".to_string())?;
        Ok(state.keys.values().cloned().collect())
    }

    async fn create_user(&self, _key: &SecretValue, draft: &UserDraft) -> Result<DescopeUser> {
        let mut state = self.record(format!("create_user:{}", draft.login_id))?;
        if state.users.contains_key(&draft.login_id) {
            return Err(ProvisioningError::upstream_rejected(format!(
                "create user failed: '{}' already exists and was not created here",
                draft.login_id
            )));
        }
        state.next_id += 1;
        let user = user_from(draft, format!("U{}", state.next_id));
        state.users.insert(draft.login_id.clone(), user.clone());
        Ok(user)
    }

    async fn update_user(&self, _key: &SecretValue, draft: &UserDraft) -> Result<DescopeUser> {
        let mut state = self.record(format!("update_user:{}", draft.login_id))?;
        let user_id = state
            .users
            .get(&draft.login_id)
            .map(|u| u.user_id.clone())
            .ok_or_else(|| ProvisioningError::not_found(format!("user {}", draft.login_id)))?;
        let user = user_from(draft, user_id);
        state.users.insert(draft.login_id.clone(), user.clone());
        Ok(user)
    }

    async fn delete_user(&self, _key: &SecretValue, login_id: &str) -> Result<()> {
        let mut state = self.record(format!("delete_user:{login_id}"))?;
        state
            .users
            .remove(login_id)
            .map(|_| ())
            .ok_or_else(|| ProvisioningError::not_found(format!("user {login_id}")))
    }

    async fn load_user(&self, _key: &SecretValue, login_id: &str) -> Result<DescopeUser> {
        let state = self.record(format!("load_user:{login_id}"))?;
        state
            .users
            .get(login_id)
            .cloned()
            .ok_or_else(|| ProvisioningError::not_found(format!("user {login_id}")))
    }

    async fn search_users(
        &self,
        _key: &SecretValue,
        limit: u32,
        page: u32,
    ) -> Result<Vec<DescopeUser>> {
        let state = self.record(format!("search_users:{limit}:{page}"))?;
        Ok(state
            .users
            .values()
            .skip((limit * page) as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn set_user_status(
        &self,
        _key: &SecretValue,
        login_id: &str,
        status: UserStatus,
    ) -> Result<DescopeUser> {
        let mut state = self.record(format!("set_user_status:{login_id}:{}", status.as_str()))?;
        let user = state
            .users
            .get_mut(login_id)
            .ok_or_else(|| ProvisioningError::not_found(format!("user {login_id}")))?;
        user.status = Some(status.as_str().to_string());
        Ok(user.clone())
    }
}
