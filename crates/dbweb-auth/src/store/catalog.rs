//! Connection catalog collaborator

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::StoreResult;

/// Read-only view of the connection catalog owned by the data source layer
#[async_trait]
pub trait ConnectionCatalog: Send + Sync {
    async fn connection_exists(&self, connection_id: &str) -> StoreResult<bool>;
}

/// Fixed set of connection ids, used by tests and the bootstrap binary
#[derive(Debug, Clone, Default)]
pub struct StaticConnectionCatalog {
    ids: Arc<RwLock<BTreeSet<String>>>,
}

impl StaticConnectionCatalog {
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Arc::new(RwLock::new(ids.into_iter().map(Into::into).collect())),
        }
    }

    pub fn add(&self, connection_id: impl Into<String>) {
        self.ids.write().insert(connection_id.into());
    }

    pub fn remove(&self, connection_id: &str) -> bool {
        self.ids.write().remove(connection_id)
    }
}

#[async_trait]
impl ConnectionCatalog for StaticConnectionCatalog {
    async fn connection_exists(&self, connection_id: &str) -> StoreResult<bool> {
        Ok(self.ids.read().contains(connection_id))
    }
}
