//! Per-user cache of granted role ids

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use super::config::RoleCacheConfig;
use crate::store::{SecurityController, StoreResult};
use crate::types::Role;

struct CachedRoles {
    role_ids: Vec<String>,
    expires_at: Option<Instant>,
}

impl CachedRoles {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entry_count: u64,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    invalidations: u64,
}

/// Role sets keyed by user id, loaded lazily from the security store.
///
/// Entries are dropped explicitly whenever a user's roles change
/// ([`invalidate`](Self::invalidate)) or a role disappears
/// ([`clear`](Self::clear)). When `max_entries` is reached an arbitrary entry
/// is evicted.
///
/// Every invalidation bumps a generation counter under the entries lock. A
/// load only fills the cache if no invalidation happened while it read the
/// store.
#[derive(Clone)]
pub struct RoleCache {
    entries: Arc<RwLock<HashMap<String, CachedRoles>>>,
    generation: Arc<AtomicU64>,
    counters: Arc<RwLock<Counters>>,
    config: RoleCacheConfig,
}

impl std::fmt::Debug for RoleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleCache")
            .field("config", &self.config)
            .field("entry_count", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for RoleCache {
    fn default() -> Self {
        Self::new(RoleCacheConfig::default())
    }
}

impl RoleCache {
    #[must_use]
    pub fn new(config: RoleCacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(RwLock::new(Counters::default())),
            config,
        }
    }

    /// Cached role ids of a user, if present and fresh
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<Vec<String>> {
        if !self.config.enabled {
            return None;
        }
        let entries = self.entries.read();
        let found = entries
            .get(user_id)
            .filter(|e| !e.is_expired())
            .map(|e| e.role_ids.clone());
        drop(entries);

        let mut counters = self.counters.write();
        if found.is_some() {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
        drop(counters);

        #[cfg(feature = "metrics")]
        crate::observability::record_role_cache_lookup(found.is_some());
        found
    }

    pub fn insert(&self, user_id: &str, role_ids: Vec<String>) {
        self.insert_if_current(user_id, role_ids, None);
    }

    /// Insert unless the generation moved past `seen`; returns whether the
    /// entry was stored
    fn insert_if_current(
        &self,
        user_id: &str,
        role_ids: Vec<String>,
        seen: Option<u64>,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }
        let entry = CachedRoles {
            role_ids,
            expires_at: self.config.ttl.map(|ttl| Instant::now() + ttl),
        };

        let mut entries = self.entries.write();
        if let Some(seen) = seen
            && self.generation.load(Ordering::Acquire) != seen
        {
            return false;
        }
        if let Some(max) = self.config.max_entries
            && entries.len() >= max
            && !entries.contains_key(user_id)
        {
            entries.retain(|_, e| !e.is_expired());
            if entries.len() >= max
                && let Some(victim) = entries.keys().next().cloned()
            {
                entries.remove(&victim);
            }
        }
        entries.insert(user_id.to_string(), entry);
        let size = entries.len();
        drop(entries);

        #[cfg(feature = "metrics")]
        crate::observability::set_role_cache_size(size as u64);
        #[cfg(not(feature = "metrics"))]
        let _ = size;
        true
    }

    /// Role ids of `user_id`, read through the cache
    pub async fn get_or_load(
        &self,
        user_id: &str,
        store: &dyn SecurityController,
    ) -> StoreResult<Vec<String>> {
        self.load_through(user_id, || store.get_user_roles(user_id))
            .await
    }

    async fn load_through<F, Fut>(&self, user_id: &str, load: F) -> StoreResult<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<Vec<Role>>>,
    {
        if let Some(role_ids) = self.get(user_id) {
            tracing::debug!(user = %user_id, "Role cache hit");
            return Ok(role_ids);
        }

        let seen = self.generation.load(Ordering::Acquire);
        let role_ids: Vec<String> = load().await?.into_iter().map(|r| r.role_id).collect();
        if self.insert_if_current(user_id, role_ids.clone(), Some(seen)) {
            tracing::debug!(user = %user_id, roles = role_ids.len(), "Role cache miss, loaded from store");
        } else {
            tracing::debug!(user = %user_id, "Role cache invalidated during load, result not cached");
        }
        Ok(role_ids)
    }

    pub fn invalidate(&self, user_id: &str) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = entries.remove(user_id).is_some();
        drop(entries);

        if removed {
            self.counters.write().invalidations += 1;
            tracing::debug!(user = %user_id, "Role cache entry invalidated");
        }
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let dropped = entries.len() as u64;
        entries.clear();
        drop(entries);
        self.counters.write().invalidations += dropped;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> RoleCacheStats {
        let counters = self.counters.read();
        RoleCacheStats {
            hits: counters.hits,
            misses: counters.misses,
            invalidations: counters.invalidations,
            entry_count: self.entries.read().len() as u64,
        }
    }
}
