//! Per-session authentication state

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::auth_info::AuthInfo;
use crate::store::{SecurityController, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Holds at most one [`AuthInfo`].
///
/// Replace and clear are single atomic pointer swaps, so a concurrent reader
/// sees either the old binding or the new one, never a mix. Writers are
/// expected to be sequential per session.
#[derive(Debug)]
pub struct SessionBinding {
    id: String,
    created_at: DateTime<Utc>,
    last_access: Mutex<DateTime<Utc>>,
    auth: ArcSwapOption<AuthInfo>,
}

impl SessionBinding {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_access: Mutex::new(now),
            auth: ArcSwapOption::empty(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.auth.load().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    #[must_use]
    pub fn auth_info(&self) -> Option<Arc<AuthInfo>> {
        self.auth.load_full()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.auth.load().as_ref().map(|a| a.user_id().to_string())
    }

    #[must_use]
    pub fn has_permission(&self, permission_id: &str) -> bool {
        self.auth
            .load()
            .as_ref()
            .is_some_and(|a| a.has_permission(permission_id))
    }

    pub fn touch(&self) {
        *self.last_access.lock() = Utc::now();
    }

    #[must_use]
    pub fn last_access(&self) -> DateTime<Utc> {
        *self.last_access.lock()
    }

    /// True when the session has been idle longer than `expire_time`
    #[must_use]
    pub fn is_expired(&self, expire_time: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_access());
        idle.to_std().is_ok_and(|idle| idle > expire_time)
    }

    /// Bound identity unless the session has been idle past `expire_time`.
    /// Does not record an access.
    #[must_use]
    pub fn active_auth_info(&self, expire_time: Duration) -> Option<Arc<AuthInfo>> {
        self.auth_info().filter(|_| !self.is_expired(expire_time))
    }

    /// Install `info` as the only bound identity; a previous binding is
    /// dropped wholesale and its provider session closed
    pub async fn bind(&self, info: Arc<AuthInfo>) {
        self.touch();
        if let Some(previous) = self.auth.swap(Some(info)) {
            close_provider_session(&self.id, &previous).await;
        }
    }

    /// Back to anonymous; returns the removed binding, if any
    pub async fn clear(&self) -> Option<Arc<AuthInfo>> {
        let previous = self.auth.swap(None)?;
        close_provider_session(&self.id, &previous).await;
        Some(previous)
    }

    /// Re-derive the bound user's permissions from the store, or clear the
    /// binding when the user no longer exists.
    ///
    /// Only the binding read at the start is replaced. If a concurrent
    /// `bind` or `clear` lands while the store is read, that newer state is kept.
    pub async fn force_refresh(&self, store: &dyn SecurityController) -> StoreResult<SessionState> {
        let loaded = self.auth.load_full();
        let Some(current) = loaded.as_ref() else {
            return Ok(SessionState::Anonymous);
        };

        let user_id = current.user_id();
        let exists = store
            .find_users(Some(user_id))
            .await?
            .iter()
            .any(|u| u.user_id == user_id);
        if !exists {
            if self.replace_if_current(&loaded, None) {
                tracing::info!(session = %self.id, user = %user_id, "Bound user no longer exists, session cleared");
                close_provider_session(&self.id, current).await;
            }
            return Ok(self.state());
        }

        let permissions = store.get_user_permissions(user_id).await?;
        let refreshed = Arc::new(current.with_permissions(permissions));
        if self.replace_if_current(&loaded, Some(refreshed)) {
            tracing::debug!(session = %self.id, user = %user_id, "Session permissions refreshed");
        } else {
            tracing::debug!(session = %self.id, user = %user_id, "Binding changed during refresh, kept the newer one");
        }
        Ok(self.state())
    }

    fn replace_if_current(
        &self,
        expected: &Option<Arc<AuthInfo>>,
        new: Option<Arc<AuthInfo>>,
    ) -> bool {
        let previous = self.auth.compare_and_swap(expected, new);
        match (previous.as_ref(), expected) {
            (Some(prev), Some(exp)) => Arc::ptr_eq(prev, exp),
            (None, None) => true,
            _ => false,
        }
    }
}

async fn close_provider_session(session_id: &str, info: &AuthInfo) {
    if let Err(e) = info.provider_session().close().await {
        tracing::warn!(
            session = %session_id,
            provider = %info.auth_provider().id,
            error = %e,
            "Failed to close provider session"
        );
    }
}
