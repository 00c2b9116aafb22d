//! Login / logout protocol

use std::fmt;
use std::sync::Arc;

use crate::config::AppConfigHolder;
use crate::constants::PERMISSION_ADMIN;
use crate::error::{Error, Result};
use crate::provider::{ProviderDescriptor, ProviderInfo, ProviderRegistry};
use crate::session::{AuthInfo, SessionBinding};
use crate::store::SecurityController;
use crate::types::{Credentials, Identity};

/// Authenticates sessions against registered providers
#[derive(Clone)]
pub struct AuthOrchestrator {
    store: Arc<dyn SecurityController>,
    registry: Arc<ProviderRegistry>,
    app_config: Arc<AppConfigHolder>,
}

impl fmt::Debug for AuthOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOrchestrator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl AuthOrchestrator {
    pub fn new(
        store: Arc<dyn SecurityController>,
        registry: Arc<ProviderRegistry>,
        app_config: Arc<AppConfigHolder>,
    ) -> Self {
        Self {
            store,
            registry,
            app_config,
        }
    }

    /// Authenticate `session` with `provider_id`.
    ///
    /// Single attempt: on success the new [`AuthInfo`] replaces whatever the
    /// session held; on failure the session is left untouched.
    pub async fn login(
        &self,
        session: &SessionBinding,
        provider_id: &str,
        credentials: Credentials,
    ) -> Result<Arc<AuthInfo>> {
        let result = self.authenticate(session, provider_id, credentials).await;

        match &result {
            Ok(info) => tracing::info!(
                session = %session.id(),
                user = %info.user_id(),
                provider = %provider_id,
                "User authenticated"
            ),
            Err(e) => tracing::warn!(
                session = %session.id(),
                provider = %provider_id,
                kind = e.kind().as_str(),
                error = %e,
                "Login failed"
            ),
        }

        #[cfg(feature = "metrics")]
        crate::observability::record_login(
            provider_id,
            result.as_ref().map_or_else(|e| e.kind().as_str(), |_| "success"),
        );

        result
    }

    async fn authenticate(
        &self,
        session: &SessionBinding,
        provider_id: &str,
        credentials: Credentials,
    ) -> Result<Arc<AuthInfo>> {
        if provider_id.is_empty() {
            return Err(Error::InvalidRequest("auth provider id is empty".into()));
        }
        let descriptor = self
            .registry
            .get_provider(provider_id)
            .ok_or_else(|| Error::UnknownProvider(provider_id.to_string()))?;
        let config = descriptor.config();

        let credentials = match descriptor.external() {
            Some(adapter) => adapter
                .normalize_credentials(config, &credentials)
                .await
                .map_err(|e| Error::authentication_failed_with("Error reading external credentials", e))?,
            None => credentials,
        };

        let user_id = self.resolve_user(descriptor, &credentials).await?;

        // Checked after resolution: admins may still log in with authentication switched off
        let permissions = self
            .store
            .get_user_permissions(&user_id)
            .await
            .map_err(|e| Error::store("User authentication failed", e))?;
        if !self.app_config.authentication_enabled() && !permissions.contains(PERMISSION_ADMIN) {
            return Err(Error::AuthenticationDisabled);
        }

        let mut user = self.load_identity(&user_id).await?;

        let stored = self
            .store
            .get_user_credentials(&user_id, provider_id)
            .await
            .map_err(|e| Error::store("Error reading user credentials", e))?;
        let provider_session = descriptor
            .provider()
            .open_session(session.id(), config, &stored, &credentials)
            .await
            .map_err(|e| {
                Error::authentication_failed_with(
                    format!("Error opening {} session", descriptor.label()),
                    e,
                )
            })?;

        if let Some(adapter) = descriptor.external() {
            match adapter.display_name(config, &credentials).await {
                Ok(Some(name)) => user.display_name = Some(name),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    user = %user_id,
                    provider = %provider_id,
                    error = %e,
                    "Display name lookup failed"
                ),
            }
        }

        let info = Arc::new(AuthInfo::new(
            user,
            descriptor.info(),
            provider_session,
            permissions,
        ));
        session.bind(Arc::clone(&info)).await;
        Ok(info)
    }

    /// Store lookup by identifying credentials, then at most one auto-registration
    async fn resolve_user(
        &self,
        descriptor: &ProviderDescriptor,
        credentials: &Credentials,
    ) -> Result<String> {
        let identifying = descriptor.identifying_credentials(credentials);
        let found = self
            .store
            .get_user_by_credentials(descriptor.id(), &identifying)
            .await
            .map_err(|e| Error::store("User authentication failed", e))?;
        if let Some(user_id) = found {
            return Ok(user_id);
        }

        let Some(adapter) = descriptor.external() else {
            return Err(Error::authentication_failed("Invalid credentials"));
        };
        let identity = adapter
            .auto_register(self.store.as_ref(), descriptor.config(), credentials)
            .await
            .map_err(|e| Error::authentication_failed_with("Error registering new user", e))?;
        if identity.user_id.is_empty() {
            return Err(Error::authentication_failed("Invalid credentials"));
        }
        if identity.origin_provider() != descriptor.id() {
            tracing::warn!(
                user = %identity.user_id,
                provider = %descriptor.id(),
                origin = %identity.origin_provider(),
                "Registered user does not carry the provider as its origin"
            );
            return Err(Error::authentication_failed(format!(
                "Registered user '{}' has origin '{}' instead of '{}'",
                identity.user_id,
                identity.origin_provider(),
                descriptor.id()
            )));
        }
        tracing::info!(
            user = %identity.user_id,
            provider = %descriptor.id(),
            "Registered new user on first login"
        );
        Ok(identity.user_id)
    }

    async fn load_identity(&self, user_id: &str) -> Result<Identity> {
        let found = self
            .store
            .find_users(Some(user_id))
            .await
            .map_err(|e| Error::store("Error reading user", e))?
            .into_iter()
            .find(|u| u.user_id == user_id);
        found.ok_or_else(|| Error::authentication_failed("Invalid credentials"))
    }

    /// Drop the bound identity and close its provider session
    pub async fn logout(&self, session: &SessionBinding) -> Result<()> {
        let Some(previous) = session.clear().await else {
            return Err(Error::NotAuthenticated(format!(
                "session '{}' has no authenticated user",
                session.id()
            )));
        };
        tracing::info!(
            session = %session.id(),
            user = %previous.user_id(),
            "User logged out"
        );

        #[cfg(feature = "metrics")]
        crate::observability::record_logout();

        Ok(())
    }

    /// Identity bound to `session`, or `None` when it is anonymous or idle
    /// past the configured session expiry. Never modifies the session.
    #[must_use]
    pub fn current_user(&self, session: &SessionBinding) -> Option<Arc<AuthInfo>> {
        session.active_auth_info(self.app_config.server().session_expire_time)
    }

    /// Registered providers in registration order
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.registry
            .list_providers()
            .iter()
            .map(ProviderDescriptor::info)
            .collect()
    }
}
