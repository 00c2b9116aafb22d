//! Configuration builder

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value;

use super::app::{AppConfig, ServerSettings};
use crate::Error;
use crate::admin::AdminPolicy;
use crate::cache::RoleCacheConfig;

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerSettings,
    pub admin: AdminBootstrap,
    pub admin_policy: AdminPolicy,
    pub role_cache: RoleCacheConfig,
    pub telemetry: TelemetryConfig,
    pub providers: Vec<ProviderSettings>,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub fn provider_settings(&self, id: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.id == id)
    }
}

/// Administrator account created by the configuration wizard at startup
#[derive(Clone, Default)]
pub struct AdminBootstrap {
    pub name: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Per-provider options from the `[[providers]]` file section
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub id: String,
    pub enabled: bool,
    pub config: BTreeMap<String, Value>,
}

impl ProviderSettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            config: BTreeMap::new(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    app: AppConfig,
    server_name: Option<String>,
    session_expire_time: Duration,
    admin: AdminBootstrap,
    admin_policy: AdminPolicy,
    role_cache: RoleCacheConfig,
    telemetry: TelemetryConfig,
    providers: Vec<ProviderSettings>,
}

impl ConfigBuilder {
    const DEFAULT_SERVICE_NAME: &'static str = "dbweb-auth";
    const DEFAULT_LOG_LEVEL: &'static str = "info";

    #[must_use]
    pub const fn new() -> Self {
        Self {
            app: AppConfig {
                anonymous_access_enabled: true,
                authentication_enabled: true,
                anonymous_user_role: String::new(),
                default_user_role: String::new(),
                supports_custom_connections: true,
                default_auth_provider: String::new(),
                plugins: BTreeMap::new(),
            },
            server_name: None,
            session_expire_time: Duration::from_secs(crate::constants::DEFAULT_SESSION_EXPIRE_SECS),
            admin: AdminBootstrap {
                name: None,
                password: None,
            },
            admin_policy: AdminPolicy::new(),
            role_cache: RoleCacheConfig::new(),
            telemetry: TelemetryConfig {
                service_name: String::new(),
                log_level: String::new(),
                json_logs: false,
            },
            providers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn authentication_enabled(mut self, enabled: bool) -> Self {
        self.app.authentication_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn anonymous_access_enabled(mut self, enabled: bool) -> Self {
        self.app.anonymous_access_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn supports_custom_connections(mut self, enabled: bool) -> Self {
        self.app.supports_custom_connections = enabled;
        self
    }

    #[must_use]
    pub fn anonymous_user_role(mut self, role: String) -> Self {
        self.app.anonymous_user_role = role;
        self
    }

    #[must_use]
    pub fn default_user_role(mut self, role: String) -> Self {
        self.app.default_user_role = role;
        self
    }

    #[must_use]
    pub fn default_auth_provider(mut self, provider_id: String) -> Self {
        self.app.default_auth_provider = provider_id;
        self
    }

    #[must_use]
    pub fn plugin_option(mut self, plugin_id: &str, option: &str, value: Value) -> Self {
        self.app.set_plugin_option(plugin_id, option, value);
        self
    }

    #[must_use]
    pub fn server_name(mut self, name: String) -> Self {
        self.server_name = Some(name);
        self
    }

    #[must_use]
    pub const fn session_expire_time(mut self, expire: Duration) -> Self {
        self.session_expire_time = expire;
        self
    }

    #[must_use]
    pub fn admin_name(mut self, name: String) -> Self {
        self.admin.name = Some(name);
        self
    }

    #[must_use]
    pub fn admin_password(mut self, password: String) -> Self {
        self.admin.password = Some(password);
        self
    }

    /// Require the admin permission for administrative operations (on by default)
    #[must_use]
    pub const fn enforce_admin_permission(mut self, enforce: bool) -> Self {
        self.admin_policy.enforce_admin_permission = enforce;
        self
    }

    #[must_use]
    pub const fn role_cache_enabled(mut self, enabled: bool) -> Self {
        self.role_cache.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn role_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.role_cache.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn role_cache_max_entries(mut self, max: Option<usize>) -> Self {
        self.role_cache.max_entries = max;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Add provider options; a later entry with the same id replaces the earlier one
    #[must_use]
    pub fn provider(mut self, settings: ProviderSettings) -> Self {
        if let Some(existing) = self.providers.iter_mut().find(|p| p.id == settings.id) {
            *existing = settings;
        } else {
            self.providers.push(settings);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let server_name = self
            .server_name
            .unwrap_or_else(|| crate::constants::DEFAULT_SERVER_NAME.to_string());
        if server_name.trim().is_empty() {
            return Err(Error::Config("server_name must not be empty".into()));
        }

        if self.session_expire_time.is_zero() {
            return Err(Error::Config("session_expire_secs must be positive".into()));
        }

        if self.admin.password.is_some() && self.admin.name.is_none() {
            return Err(Error::Config(
                "admin password given without an admin name".into(),
            ));
        }

        // Apply defaults for role names and provider
        let mut app = self.app;
        if app.anonymous_user_role.is_empty() {
            app.anonymous_user_role = crate::constants::DEFAULT_USER_ROLE.to_string();
        }
        if app.default_user_role.is_empty() {
            app.default_user_role = crate::constants::DEFAULT_USER_ROLE.to_string();
        }
        if app.default_auth_provider.is_empty() {
            app.default_auth_provider = crate::constants::PROVIDER_LOCAL.to_string();
        }

        // Apply defaults for telemetry
        let service_name = if self.telemetry.service_name.is_empty() {
            Self::DEFAULT_SERVICE_NAME.to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            Self::DEFAULT_LOG_LEVEL.to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            app,
            server: ServerSettings {
                server_name,
                session_expire_time: self.session_expire_time,
                configured: false,
            },
            admin: self.admin,
            admin_policy: self.admin_policy,
            role_cache: self.role_cache,
            telemetry: TelemetryConfig {
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
            providers: self.providers,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
