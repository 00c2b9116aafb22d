//! Application configuration patched at runtime by administrators

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    DEFAULT_SERVER_NAME, DEFAULT_SESSION_EXPIRE_SECS, DEFAULT_USER_ROLE, PROVIDER_LOCAL,
};

/// Application-level switches consulted by the login flow and admin service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub anonymous_access_enabled: bool,
    /// When off, only users holding the admin permission may log in
    pub authentication_enabled: bool,
    pub anonymous_user_role: String,
    pub default_user_role: String,
    pub supports_custom_connections: bool,
    pub default_auth_provider: String,
    /// Free-form per-plugin option maps
    pub plugins: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            anonymous_access_enabled: true,
            authentication_enabled: true,
            anonymous_user_role: DEFAULT_USER_ROLE.to_string(),
            default_user_role: DEFAULT_USER_ROLE.to_string(),
            supports_custom_connections: true,
            default_auth_provider: PROVIDER_LOCAL.to_string(),
            plugins: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn plugin_option(&self, plugin_id: &str, option: &str) -> Option<&Value> {
        self.plugins.get(plugin_id).and_then(|p| p.get(option))
    }

    pub fn set_plugin_option(
        &mut self,
        plugin_id: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.plugins
            .entry(plugin_id.into())
            .or_default()
            .insert(option.into(), value.into());
    }
}

/// Server identity and session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub server_name: String,
    pub session_expire_time: Duration,
    /// Set once the configuration wizard has completed
    pub configured: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            session_expire_time: Duration::from_secs(DEFAULT_SESSION_EXPIRE_SECS),
            configured: false,
        }
    }
}

/// Lock-free holder of the current [`AppConfig`] and [`ServerSettings`].
///
/// Readers capture an `Arc` snapshot; a reconfiguration swaps both values
/// without disturbing in-flight logins.
#[derive(Debug)]
pub struct AppConfigHolder {
    app: ArcSwap<AppConfig>,
    server: ArcSwap<ServerSettings>,
}

impl Default for AppConfigHolder {
    fn default() -> Self {
        Self::new(AppConfig::default(), ServerSettings::default())
    }
}

impl AppConfigHolder {
    #[must_use]
    pub fn new(app: AppConfig, server: ServerSettings) -> Self {
        Self {
            app: ArcSwap::from_pointee(app),
            server: ArcSwap::from_pointee(server),
        }
    }

    #[must_use]
    pub fn app(&self) -> Arc<AppConfig> {
        self.app.load_full()
    }

    #[must_use]
    pub fn server(&self) -> Arc<ServerSettings> {
        self.server.load_full()
    }

    pub fn store_app(&self, config: AppConfig) {
        self.app.store(Arc::new(config));
    }

    pub fn store_server(&self, settings: ServerSettings) {
        self.server.store(Arc::new(settings));
    }

    #[must_use]
    pub fn authentication_enabled(&self) -> bool {
        self.app.load().authentication_enabled
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.server.load().configured
    }
}
