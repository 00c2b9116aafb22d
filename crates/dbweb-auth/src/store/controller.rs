//! Security controller trait definition

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::error::StoreResult;
use crate::types::{ConnectionGrant, Credentials, Identity, Role};

/// Persistent store of users, roles, permissions, credentials and grants.
///
/// Implementations must serialize conflicting writes at least per user or
/// role record. Every list replacement (`set_*`) is a single atomic commit.
///
/// `pattern` arguments: `None` lists everything, `Some("abc")` matches the
/// id exactly and `Some("ab*")` matches by prefix.
#[async_trait]
pub trait SecurityController: Send + Sync {
    async fn find_users(&self, pattern: Option<&str>) -> StoreResult<Vec<Identity>>;

    async fn create_user(&self, user: &Identity) -> StoreResult<()>;

    async fn delete_user(&self, user_id: &str) -> StoreResult<()>;

    async fn find_roles(&self, pattern: Option<&str>) -> StoreResult<Vec<Role>>;

    async fn create_role(&self, role: &Role) -> StoreResult<()>;

    async fn delete_role(&self, role_id: &str) -> StoreResult<()>;

    async fn get_user_roles(&self, user_id: &str) -> StoreResult<Vec<Role>>;

    /// Replace the full role set of a user
    async fn set_user_roles(
        &self,
        user_id: &str,
        role_ids: &[String],
        granted_by: &str,
    ) -> StoreResult<()>;

    /// Permissions granted directly to a user or role
    async fn get_subject_permissions(&self, subject_id: &str) -> StoreResult<BTreeSet<String>>;

    /// Replace the full permission set of a user or role
    async fn set_subject_permissions(
        &self,
        subject_id: &str,
        permission_ids: &[String],
        granted_by: &str,
    ) -> StoreResult<()>;

    /// Find the user whose stored credentials for `provider_id` contain all
    /// of the given identifying credentials
    async fn get_user_by_credentials(
        &self,
        provider_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<Option<String>>;

    async fn get_user_credentials(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> StoreResult<Credentials>;

    async fn set_user_credentials(
        &self,
        user_id: &str,
        provider_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<()>;

    /// Effective permissions: direct grants plus those of every granted role
    async fn get_user_permissions(&self, user_id: &str) -> StoreResult<BTreeSet<String>>;

    async fn get_connection_subject_access(
        &self,
        connection_id: &str,
    ) -> StoreResult<Vec<ConnectionGrant>>;

    async fn get_subject_connection_access(
        &self,
        subject_ids: &[String],
    ) -> StoreResult<Vec<ConnectionGrant>>;

    /// Replace the subjects allowed to use a connection; an empty list revokes all
    async fn set_connection_subject_access(
        &self,
        connection_id: &str,
        subject_ids: &[String],
        granted_by: Option<&str>,
    ) -> StoreResult<()>;

    /// Replace the connections a subject may use; an empty list revokes all
    async fn set_subject_connection_access(
        &self,
        subject_id: &str,
        connection_ids: &[String],
        granted_by: &str,
    ) -> StoreResult<()>;
}

/// Match an id against a `find_*` pattern
pub(crate) fn matches_pattern(pattern: Option<&str>, id: &str) -> bool {
    match pattern {
        None => true,
        Some(p) => p
            .strip_suffix('*')
            .map_or_else(|| p == id, |prefix| id.starts_with(prefix)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_pattern_none_matches_all() {
        assert!(matches_pattern(None, "alice"));
        assert!(matches_pattern(None, ""));
    }

    #[test]
    fn test_matches_pattern_exact() {
        assert!(matches_pattern(Some("alice"), "alice"));
        assert!(!matches_pattern(Some("alice"), "alice2"));
        assert!(!matches_pattern(Some("ali"), "alice"));
    }

    #[test]
    fn test_matches_pattern_prefix() {
        assert!(matches_pattern(Some("ali*"), "alice"));
        assert!(matches_pattern(Some("*"), "anything"));
        assert!(!matches_pattern(Some("bo*"), "alice"));
    }
}
