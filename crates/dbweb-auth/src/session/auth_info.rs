//! Record of a completed authentication

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::PERMISSION_ADMIN;
use crate::provider::{ProviderInfo, ProviderSession};
use crate::types::Identity;

/// Identity bound to a session by a successful login.
///
/// Owned by exactly one [`SessionBinding`](super::SessionBinding); the
/// provider session is closed when the binding drops it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthInfo {
    user: Identity,
    auth_provider: ProviderInfo,
    #[serde(skip)]
    provider_session: Arc<dyn ProviderSession>,
    login_time: DateTime<Utc>,
    message: String,
    permissions: BTreeSet<String>,
}

impl AuthInfo {
    pub fn new(
        user: Identity,
        auth_provider: ProviderInfo,
        provider_session: Arc<dyn ProviderSession>,
        permissions: BTreeSet<String>,
    ) -> Self {
        let message = format!("Authenticated with {} provider", auth_provider.label);
        Self {
            user,
            auth_provider,
            provider_session,
            login_time: Utc::now(),
            message,
            permissions,
        }
    }

    #[must_use]
    pub const fn user(&self) -> &Identity {
        &self.user
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }

    #[must_use]
    pub const fn auth_provider(&self) -> &ProviderInfo {
        &self.auth_provider
    }

    #[must_use]
    pub fn provider_session(&self) -> &Arc<dyn ProviderSession> {
        &self.provider_session
    }

    #[must_use]
    pub const fn login_time(&self) -> DateTime<Utc> {
        self.login_time
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    #[must_use]
    pub fn has_permission(&self, permission_id: &str) -> bool {
        self.permissions.contains(permission_id)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_permission(PERMISSION_ADMIN)
    }

    /// Same login with a re-derived permission set
    #[must_use]
    pub fn with_permissions(&self, permissions: BTreeSet<String>) -> Self {
        Self {
            permissions,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BasicSession;

    fn info(permissions: &[&str]) -> AuthInfo {
        AuthInfo::new(
            Identity::new("alice"),
            ProviderInfo {
                id: "local".into(),
                label: "Local".into(),
                description: None,
                external: false,
                credential_parameters: Vec::new(),
            },
            Arc::new(BasicSession::new("local", "s-1")),
            permissions.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn test_message_names_provider() {
        assert_eq!(info(&[]).message(), "Authenticated with Local provider");
    }

    #[test]
    fn test_permissions() {
        let auth = info(&["public"]);
        assert!(auth.has_permission("public"));
        assert!(!auth.is_admin());

        let refreshed = auth.with_permissions(["admin".to_string()].into());
        assert!(refreshed.is_admin());
        assert_eq!(refreshed.login_time(), auth.login_time());
        assert_eq!(refreshed.user_id(), "alice");
    }

    #[test]
    fn test_serialize_skips_session_handle() {
        let value = serde_json::to_value(info(&["public"])).unwrap();
        assert_eq!(value["user"]["user_id"], "alice");
        assert_eq!(value["auth_provider"]["id"], "local");
        assert!(value.get("provider_session").is_none());
        assert_eq!(value["permissions"][0], "public");
    }
}
