//! Environment variable loading for configuration

use std::env;
use std::time::Duration;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const DBWEB_AUTH_ENABLED: &str = "DBWEB_AUTH_ENABLED";
    pub const DBWEB_ANONYMOUS_ACCESS: &str = "DBWEB_ANONYMOUS_ACCESS";
    pub const DBWEB_DEFAULT_AUTH_PROVIDER: &str = "DBWEB_DEFAULT_AUTH_PROVIDER";
    pub const DBWEB_SERVER_NAME: &str = "DBWEB_SERVER_NAME";
    pub const DBWEB_SESSION_EXPIRE_SECS: &str = "DBWEB_SESSION_EXPIRE_SECS";
    pub const DBWEB_ADMIN_NAME: &str = "DBWEB_ADMIN_NAME";
    pub const DBWEB_ADMIN_PASSWORD: &str = "DBWEB_ADMIN_PASSWORD";
    pub const DBWEB_ROLE_CACHE_TTL_SECS: &str = "DBWEB_ROLE_CACHE_TTL_SECS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const DBWEB_JSON_LOGS: &str = "DBWEB_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(val) = env::var(vars::DBWEB_AUTH_ENABLED) {
        builder = builder.authentication_enabled(parse_bool(&val));
    }

    if let Ok(val) = env::var(vars::DBWEB_ANONYMOUS_ACCESS) {
        builder = builder.anonymous_access_enabled(parse_bool(&val));
    }

    if let Ok(provider) = env::var(vars::DBWEB_DEFAULT_AUTH_PROVIDER) {
        builder = builder.default_auth_provider(provider);
    }

    if let Ok(name) = env::var(vars::DBWEB_SERVER_NAME) {
        builder = builder.server_name(name);
    }

    if let Ok(secs_str) = env::var(vars::DBWEB_SESSION_EXPIRE_SECS) {
        let secs = secs_str.parse::<u64>().map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {}", vars::DBWEB_SESSION_EXPIRE_SECS, e))
        })?;
        builder = builder.session_expire_time(Duration::from_secs(secs));
    }

    // Bootstrap administrator
    if let Ok(name) = env::var(vars::DBWEB_ADMIN_NAME) {
        builder = builder.admin_name(name);
    }

    if let Ok(password) = env::var(vars::DBWEB_ADMIN_PASSWORD) {
        builder = builder.admin_password(password);
    }

    // Role cache TTL, 0 keeps entries until invalidated
    if let Ok(ttl_str) = env::var(vars::DBWEB_ROLE_CACHE_TTL_SECS)
        && let Ok(secs) = ttl_str.parse::<u64>()
    {
        builder = builder.role_cache_ttl((secs > 0).then(|| Duration::from_secs(secs)));
    }

    // Telemetry
    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::DBWEB_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
