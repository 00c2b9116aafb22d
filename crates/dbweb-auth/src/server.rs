//! Wiring of the authentication core

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::admin::{AdminAccessService, ServerConfigRequest};
use crate::auth::AuthOrchestrator;
use crate::cache::RoleCache;
use crate::config::AppConfigHolder;
use crate::constants::PROVIDER_LOCAL;
use crate::provider::{LocalAuthProvider, ProviderRegistry, ServiceDescriptor};
use crate::session::SessionBinding;
use crate::store::{
    ConnectionCatalog, MemorySecurityController, SecurityController, StaticConnectionCatalog,
};
use crate::{Config, Result};

/// Owns the shared store, registry and runtime configuration and hands out
/// the login and admin services built on them
pub struct AuthServer {
    config: Arc<Config>,
    store: Arc<dyn SecurityController>,
    registry: Arc<ProviderRegistry>,
    app_config: Arc<AppConfigHolder>,
    orchestrator: AuthOrchestrator,
    admin: AdminAccessService,
    next_session: AtomicU64,
}

impl fmt::Debug for AuthServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthServer")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("app_config", &self.app_config)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl AuthServer {
    pub fn new(
        config: Config,
        store: Arc<dyn SecurityController>,
        catalog: Arc<dyn ConnectionCatalog>,
        registry: ProviderRegistry,
    ) -> Self {
        let registry = Arc::new(registry);
        let app_config = Arc::new(AppConfigHolder::new(
            config.app.clone(),
            config.server.clone(),
        ));
        let orchestrator =
            AuthOrchestrator::new(Arc::clone(&store), Arc::clone(&registry), Arc::clone(&app_config));
        let admin = AdminAccessService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            catalog,
            Arc::clone(&app_config),
        )
        .with_role_cache(RoleCache::new(config.role_cache))
        .with_policy(config.admin_policy);

        Self {
            config: Arc::new(config),
            store,
            registry,
            app_config,
            orchestrator,
            admin,
            next_session: AtomicU64::new(1),
        }
    }

    /// Server backed by [`MemorySecurityController`] and an empty
    /// [`StaticConnectionCatalog`]
    pub fn in_memory(config: Config) -> Result<Self> {
        let registry = registry_from_config(&config)?;
        Ok(Self::new(
            config,
            Arc::new(MemorySecurityController::new()),
            Arc::new(StaticConnectionCatalog::default()),
            registry,
        ))
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SecurityController> {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn app_config(&self) -> &Arc<AppConfigHolder> {
        &self.app_config
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &AuthOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub const fn admin(&self) -> &AdminAccessService {
        &self.admin
    }

    /// Fresh anonymous session with a process-unique id
    pub fn new_session(&self) -> SessionBinding {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        SessionBinding::new(format!("session-{n:08}"))
    }

    /// Run the configuration wizard for the administrator named in the
    /// configuration, unless the server is configured already
    pub async fn bootstrap(&self) -> Result<()> {
        if self.app_config.is_configured() {
            return Ok(());
        }
        let Some(admin_name) = self.config.admin.name.clone() else {
            tracing::info!("No administrator configured; server waits for the configuration wizard");
            return Ok(());
        };

        let request = ServerConfigRequest {
            server_name: Some(self.config.server.server_name.clone()),
            session_expire_secs: Some(self.config.server.session_expire_time.as_secs()),
            admin_name: Some(admin_name),
            admin_password: self.config.admin.password.clone(),
            ..ServerConfigRequest::default()
        };
        let session = self.new_session();
        self.admin.configure_server(&session, request).await
    }
}

/// Registry holding the built-in providers that the configuration leaves
/// enabled, plus the core permission service
pub fn registry_from_config(config: &Config) -> Result<ProviderRegistry> {
    let mut builder = ProviderRegistry::builder().service(ServiceDescriptor::core());

    match config.provider_settings(PROVIDER_LOCAL) {
        None => builder = builder.provider(LocalAuthProvider::descriptor()?),
        Some(settings) if settings.enabled => {
            let local = LocalAuthProvider::descriptor_with(settings.config.clone())?;
            builder = builder.provider(local);
        }
        Some(_) => {}
    }

    for settings in &config.providers {
        if settings.id != PROVIDER_LOCAL && settings.enabled {
            tracing::warn!(provider = %settings.id, "No built-in implementation for provider, skipping");
        }
    }

    builder.build()
}
