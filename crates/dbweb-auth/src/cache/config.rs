//! Role cache configuration

use std::time::Duration;

/// Default lifetime of a cached role set
pub const DEFAULT_ROLE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached users
pub const DEFAULT_ROLE_CACHE_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCacheConfig {
    /// Whether role sets are cached at all
    pub enabled: bool,
    /// Entry lifetime; `None` keeps entries until invalidated
    pub ttl: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl Default for RoleCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleCacheConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            ttl: Some(DEFAULT_ROLE_CACHE_TTL),
            max_entries: Some(DEFAULT_ROLE_CACHE_MAX_ENTRIES),
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: None,
            max_entries: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_cache_config_default() {
        let config = RoleCacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ttl, Some(Duration::from_secs(300)));
        assert_eq!(config.max_entries, Some(10_000));
    }

    #[test]
    fn test_role_cache_config_disabled() {
        let config = RoleCacheConfig::disabled();
        assert!(!config.enabled);
        assert!(config.ttl.is_none());
    }
}
