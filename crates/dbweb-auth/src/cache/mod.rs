//! Role cache
//!
//! Role sets are read often (every admin check, every grant listing) and
//! change rarely. [`RoleCache`] keeps them per user id; every operation that
//! changes a user's roles must invalidate that user's entry, and deleting a
//! role clears the whole cache.

mod config;
mod role_cache;

pub use config::{DEFAULT_ROLE_CACHE_MAX_ENTRIES, DEFAULT_ROLE_CACHE_TTL, RoleCacheConfig};
pub use role_cache::{RoleCache, RoleCacheStats};
