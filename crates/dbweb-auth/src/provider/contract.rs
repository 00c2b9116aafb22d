//! Provider capability traits

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::ProviderResult;
use super::schema::ProviderConfig;
use crate::store::SecurityController;
use crate::types::{Credentials, Identity};

/// Provider-specific session state held by an authenticated binding
#[async_trait]
pub trait ProviderSession: Send + Sync + fmt::Debug {
    fn provider_id(&self) -> &str;

    /// Release backend resources; called when the binding is cleared or replaced
    async fn close(&self) -> ProviderResult<()> {
        Ok(())
    }
}

/// Core capability of every provider: verify credentials and open a session
#[async_trait]
pub trait AuthProvider: Send + Sync + fmt::Debug {
    /// `stored` is what the security store holds for the resolved user,
    /// `presented` is what the caller submitted (already normalized).
    async fn open_session(
        &self,
        session_id: &str,
        config: &ProviderConfig,
        stored: &Credentials,
        presented: &Credentials,
    ) -> ProviderResult<Arc<dyn ProviderSession>>;
}

/// Extra capability of providers backed by an outside identity system.
///
/// Providers without it are local-only: users must exist in the store before
/// they can log in.
#[async_trait]
pub trait ExternalAuthAdapter: Send + Sync + fmt::Debug {
    /// Verify raw credentials with the backend and return the canonical form
    /// used for lookup and session opening
    async fn normalize_credentials(
        &self,
        config: &ProviderConfig,
        raw: &Credentials,
    ) -> ProviderResult<Credentials>;

    /// Create the store records for a user seen for the first time
    async fn auto_register(
        &self,
        store: &dyn SecurityController,
        config: &ProviderConfig,
        credentials: &Credentials,
    ) -> ProviderResult<Identity>;

    async fn display_name(
        &self,
        config: &ProviderConfig,
        credentials: &Credentials,
    ) -> ProviderResult<Option<String>>;
}

/// Minimal session for providers that keep no backend state
#[derive(Debug, Clone)]
pub struct BasicSession {
    provider_id: String,
    session_id: String,
}

impl BasicSession {
    pub fn new(provider_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            session_id: session_id.into(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl ProviderSession for BasicSession {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_session_close_is_noop() {
        let session = BasicSession::new("local", "s-1");
        assert_eq!(session.provider_id(), "local");
        assert_eq!(session.session_id(), "s-1");
        assert!(session.close().await.is_ok());
    }
}
