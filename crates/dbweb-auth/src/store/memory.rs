//! In-memory security controller

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::controller::{SecurityController, matches_pattern};
use super::error::{StoreError, StoreResult};
use crate::types::{ConnectionGrant, Credentials, Identity, Role, SubjectType};

#[derive(Debug, Clone)]
struct GrantRecord {
    subject_type: SubjectType,
    granted_by: Option<String>,
}

/// Whole store state; one lock makes every write a single commit
#[derive(Debug, Default)]
struct State {
    users: BTreeMap<String, Identity>,
    roles: BTreeMap<String, Role>,
    user_roles: BTreeMap<String, BTreeSet<String>>,
    subject_permissions: BTreeMap<String, BTreeSet<String>>,
    // (user_id, provider_id)
    credentials: BTreeMap<(String, String), Credentials>,
    // (connection_id, subject_id)
    grants: BTreeMap<(String, String), GrantRecord>,
}

impl State {
    fn subject_type(&self, subject_id: &str) -> StoreResult<SubjectType> {
        if self.users.contains_key(subject_id) {
            Ok(SubjectType::User)
        } else if self.roles.contains_key(subject_id) {
            Ok(SubjectType::Role)
        } else {
            Err(StoreError::not_found("Subject", subject_id))
        }
    }

    fn require_user(&self, user_id: &str) -> StoreResult<()> {
        if self.users.contains_key(user_id) {
            Ok(())
        } else {
            Err(StoreError::not_found("User", user_id))
        }
    }

    fn role_with_permissions(&self, role: &Role) -> Role {
        let mut role = role.clone();
        role.permissions = self
            .subject_permissions
            .get(&role.role_id)
            .cloned()
            .unwrap_or_default();
        role
    }

    fn grants_where(&self, pred: impl Fn(&str, &str) -> bool) -> Vec<ConnectionGrant> {
        self.grants
            .iter()
            .filter(|((conn, subject), _)| pred(conn, subject))
            .map(|((conn, subject), record)| ConnectionGrant {
                connection_id: conn.clone(),
                subject_id: subject.clone(),
                subject_type: record.subject_type,
                granted_by: record.granted_by.clone(),
            })
            .collect()
    }

    fn drop_subject(&mut self, subject_id: &str) {
        self.subject_permissions.remove(subject_id);
        self.grants.retain(|(_, subject), _| subject != subject_id);
    }
}

/// Thread-safe in-memory `SecurityController`.
///
/// Clones share state. Users and roles live in one subject namespace, so a
/// role cannot reuse a user id and vice versa.
#[derive(Clone, Default)]
pub struct MemorySecurityController {
    state: Arc<RwLock<State>>,
}

impl std::fmt::Debug for MemorySecurityController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemorySecurityController")
            .field("users", &state.users.len())
            .field("roles", &state.roles.len())
            .field("grants", &state.grants.len())
            .finish_non_exhaustive()
    }
}

impl MemorySecurityController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityController for MemorySecurityController {
    async fn find_users(&self, pattern: Option<&str>) -> StoreResult<Vec<Identity>> {
        let state = self.state.read();
        Ok(state
            .users
            .values()
            .filter(|u| matches_pattern(pattern, &u.user_id))
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &Identity) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.users.contains_key(&user.user_id) || state.roles.contains_key(&user.user_id) {
            return Err(StoreError::duplicate("User", &user.user_id));
        }
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.users.remove(user_id).is_none() {
            return Err(StoreError::not_found("User", user_id));
        }
        state.user_roles.remove(user_id);
        state.credentials.retain(|(user, _), _| user != user_id);
        state.drop_subject(user_id);
        Ok(())
    }

    async fn find_roles(&self, pattern: Option<&str>) -> StoreResult<Vec<Role>> {
        let state = self.state.read();
        Ok(state
            .roles
            .values()
            .filter(|r| matches_pattern(pattern, &r.role_id))
            .map(|r| state.role_with_permissions(r))
            .collect())
    }

    async fn create_role(&self, role: &Role) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.roles.contains_key(&role.role_id) || state.users.contains_key(&role.role_id) {
            return Err(StoreError::duplicate("Role", &role.role_id));
        }
        if !role.permissions.is_empty() {
            state
                .subject_permissions
                .insert(role.role_id.clone(), role.permissions.clone());
        }
        let mut stored = role.clone();
        stored.permissions.clear();
        state.roles.insert(role.role_id.clone(), stored);
        Ok(())
    }

    async fn delete_role(&self, role_id: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.roles.remove(role_id).is_none() {
            return Err(StoreError::not_found("Role", role_id));
        }
        for roles in state.user_roles.values_mut() {
            roles.remove(role_id);
        }
        state.drop_subject(role_id);
        Ok(())
    }

    async fn get_user_roles(&self, user_id: &str) -> StoreResult<Vec<Role>> {
        let state = self.state.read();
        state.require_user(user_id)?;
        Ok(state
            .user_roles
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.roles.get(id))
            .map(|r| state.role_with_permissions(r))
            .collect())
    }

    async fn set_user_roles(
        &self,
        user_id: &str,
        role_ids: &[String],
        _granted_by: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        state.require_user(user_id)?;
        if let Some(missing) = role_ids.iter().find(|id| !state.roles.contains_key(*id)) {
            return Err(StoreError::not_found("Role", missing));
        }
        state
            .user_roles
            .insert(user_id.to_string(), role_ids.iter().cloned().collect());
        Ok(())
    }

    async fn get_subject_permissions(&self, subject_id: &str) -> StoreResult<BTreeSet<String>> {
        let state = self.state.read();
        state.subject_type(subject_id)?;
        Ok(state
            .subject_permissions
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_subject_permissions(
        &self,
        subject_id: &str,
        permission_ids: &[String],
        _granted_by: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        state.subject_type(subject_id)?;
        state.subject_permissions.insert(
            subject_id.to_string(),
            permission_ids.iter().cloned().collect(),
        );
        Ok(())
    }

    async fn get_user_by_credentials(
        &self,
        provider_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<Option<String>> {
        if credentials.is_empty() {
            return Ok(None);
        }
        let state = self.state.read();
        Ok(state
            .credentials
            .iter()
            .find(|((_, provider), stored)| {
                provider == provider_id && stored.contains_all(credentials)
            })
            .map(|((user, _), _)| user.clone()))
    }

    async fn get_user_credentials(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> StoreResult<Credentials> {
        let state = self.state.read();
        state.require_user(user_id)?;
        Ok(state
            .credentials
            .get(&(user_id.to_string(), provider_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_user_credentials(
        &self,
        user_id: &str,
        provider_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        state.require_user(user_id)?;
        state.credentials.insert(
            (user_id.to_string(), provider_id.to_string()),
            credentials.clone(),
        );
        Ok(())
    }

    async fn get_user_permissions(&self, user_id: &str) -> StoreResult<BTreeSet<String>> {
        let state = self.state.read();
        state.require_user(user_id)?;
        let mut permissions = state
            .subject_permissions
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        for role_id in state.user_roles.get(user_id).into_iter().flatten() {
            if let Some(role_permissions) = state.subject_permissions.get(role_id) {
                permissions.extend(role_permissions.iter().cloned());
            }
        }
        Ok(permissions)
    }

    async fn get_connection_subject_access(
        &self,
        connection_id: &str,
    ) -> StoreResult<Vec<ConnectionGrant>> {
        let state = self.state.read();
        Ok(state.grants_where(|conn, _| conn == connection_id))
    }

    async fn get_subject_connection_access(
        &self,
        subject_ids: &[String],
    ) -> StoreResult<Vec<ConnectionGrant>> {
        let state = self.state.read();
        Ok(state.grants_where(|_, subject| subject_ids.iter().any(|s| s == subject)))
    }

    async fn set_connection_subject_access(
        &self,
        connection_id: &str,
        subject_ids: &[String],
        granted_by: Option<&str>,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        let mut records = Vec::with_capacity(subject_ids.len());
        for subject in subject_ids {
            records.push((subject.clone(), state.subject_type(subject)?));
        }
        state.grants.retain(|(conn, _), _| conn != connection_id);
        for (subject, subject_type) in records {
            state.grants.insert(
                (connection_id.to_string(), subject),
                GrantRecord {
                    subject_type,
                    granted_by: granted_by.map(str::to_string),
                },
            );
        }
        Ok(())
    }

    async fn set_subject_connection_access(
        &self,
        subject_id: &str,
        connection_ids: &[String],
        granted_by: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        let subject_type = state.subject_type(subject_id)?;
        state.grants.retain(|(_, subject), _| subject != subject_id);
        for conn in connection_ids {
            state.grants.insert(
                (conn.clone(), subject_id.to_string()),
                GrantRecord {
                    subject_type,
                    granted_by: Some(granted_by.to_string()),
                },
            );
        }
        Ok(())
    }
}
