//! TOML configuration file loading

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::builder::{ConfigBuilder, ProviderSettings};
use crate::Result;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./dbweb-auth.toml",
    "~/.config/dbweb-auth/config.toml",
    "/etc/dbweb-auth/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(apply_file_config(builder, file_config))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> ConfigBuilder {
    // Application settings
    if let Some(app) = config.app {
        if let Some(enabled) = app.authentication_enabled {
            builder = builder.authentication_enabled(enabled);
        }
        if let Some(enabled) = app.anonymous_access_enabled {
            builder = builder.anonymous_access_enabled(enabled);
        }
        if let Some(enabled) = app.supports_custom_connections {
            builder = builder.supports_custom_connections(enabled);
        }
        if let Some(role) = app.anonymous_user_role {
            builder = builder.anonymous_user_role(role);
        }
        if let Some(role) = app.default_user_role {
            builder = builder.default_user_role(role);
        }
        if let Some(provider) = app.default_auth_provider {
            builder = builder.default_auth_provider(provider);
        }
        for (plugin_id, options) in app.plugins {
            for (option, value) in options {
                builder = builder.plugin_option(&plugin_id, &option, value);
            }
        }
    }

    // Server settings
    if let Some(server) = config.server {
        if let Some(name) = server.name {
            builder = builder.server_name(name);
        }
        if let Some(secs) = server.session_expire_secs {
            builder = builder.session_expire_time(Duration::from_secs(secs));
        }
    }

    // Bootstrap administrator
    if let Some(admin) = config.admin {
        if let Some(name) = admin.name {
            builder = builder.admin_name(name);
        }
        if let Some(password) = admin.password {
            builder = builder.admin_password(password);
        }
        if let Some(enforce) = admin.enforce_admin_permission {
            builder = builder.enforce_admin_permission(enforce);
        }
    }

    // Role cache
    if let Some(cache) = config.cache {
        if let Some(enabled) = cache.enabled {
            builder = builder.role_cache_enabled(enabled);
        }
        if let Some(secs) = cache.ttl_secs {
            let ttl = (secs > 0).then(|| Duration::from_secs(secs));
            builder = builder.role_cache_ttl(ttl);
        }
        if let Some(max) = cache.max_entries {
            builder = builder.role_cache_max_entries((max > 0).then_some(max));
        }
    }

    // Observability settings
    if let Some(obs) = config.observability {
        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }
        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    for provider in config.providers {
        builder = builder.provider(ProviderSettings {
            id: provider.id,
            enabled: provider.enabled.unwrap_or(true),
            config: provider.config,
        });
    }

    builder
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    app: Option<AppFileConfig>,
    server: Option<ServerFileConfig>,
    admin: Option<AdminFileConfig>,
    cache: Option<CacheFileConfig>,
    observability: Option<ObservabilityConfig>,
    #[serde(default)]
    providers: Vec<ProviderFileConfig>,
}

#[derive(Debug, Deserialize)]
struct AppFileConfig {
    anonymous_access_enabled: Option<bool>,
    authentication_enabled: Option<bool>,
    anonymous_user_role: Option<String>,
    default_user_role: Option<String>,
    supports_custom_connections: Option<bool>,
    default_auth_provider: Option<String>,
    #[serde(default)]
    plugins: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ServerFileConfig {
    name: Option<String>,
    session_expire_secs: Option<u64>,
}

#[derive(Deserialize)]
struct AdminFileConfig {
    name: Option<String>,
    password: Option<String>,
    enforce_admin_permission: Option<bool>,
}

impl std::fmt::Debug for AdminFileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminFileConfig")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("enforce_admin_permission", &self.enforce_admin_permission)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CacheFileConfig {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ProviderFileConfig {
    id: String,
    enabled: Option<bool>,
    #[serde(default)]
    config: BTreeMap<String, Value>,
}
