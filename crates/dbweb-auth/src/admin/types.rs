//! Administrative views and requests

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Provider a user originates from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserOrigin {
    pub provider_id: String,
    /// `None` when the provider is no longer registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminUserInfo {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub origin: UserOrigin,
    pub granted_roles: Vec<String>,
    pub meta_parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRoleInfo {
    pub role_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub role_permissions: Vec<String>,
}

impl From<Role> for AdminRoleInfo {
    fn from(role: Role) -> Self {
        Self {
            role_id: role.role_id,
            name: role.name,
            description: role.description,
            role_permissions: role.permissions.into_iter().collect(),
        }
    }
}

/// Input of the server configuration wizard
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfigRequest {
    pub server_name: Option<String>,
    pub session_expire_secs: Option<u64>,
    /// Falls back to the acting user (without a password)
    pub admin_name: Option<String>,
    pub admin_password: Option<String>,
    pub anonymous_access_enabled: Option<bool>,
    pub authentication_enabled: Option<bool>,
    pub custom_connections_enabled: Option<bool>,
}

impl fmt::Debug for ServerConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfigRequest")
            .field("server_name", &self.server_name)
            .field("session_expire_secs", &self.session_expire_secs)
            .field("admin_name", &self.admin_name)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("anonymous_access_enabled", &self.anonymous_access_enabled)
            .field("authentication_enabled", &self.authentication_enabled)
            .field("custom_connections_enabled", &self.custom_connections_enabled)
            .finish()
    }
}
