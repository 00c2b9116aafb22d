//! Administrative operations on users, roles, permissions and grants

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;

use super::configurator::ServerConfigurator;
use super::types::{AdminRoleInfo, AdminUserInfo, ServerConfigRequest, UserOrigin};
use crate::cache::RoleCache;
use crate::config::AppConfigHolder;
use crate::constants::{CRED_PASSWORD, CRED_USER, PERMISSION_ADMIN, PROVIDER_LOCAL, ROLE_ADMIN};
use crate::error::{Error, Result};
use crate::provider::ProviderRegistry;
use crate::session::{AuthInfo, SessionBinding};
use crate::store::{ConnectionCatalog, SecurityController};
use crate::types::{ConnectionGrant, Credentials, Identity, PermissionInfo, Role};

/// Who may call administrative operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminPolicy {
    /// Require the `admin` permission in addition to an authenticated session
    pub enforce_admin_permission: bool,
}

impl AdminPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enforce_admin_permission: true,
        }
    }
}

impl Default for AdminPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// User, role, permission and connection-grant management.
///
/// Every operation except [`configure_server`](Self::configure_server) on an
/// unconfigured server and [`connection_removed`](Self::connection_removed)
/// needs an authenticated acting session. No session may delete its own
/// user, change its own roles or permissions, or delete a role it holds.
pub struct AdminAccessService {
    store: Arc<dyn SecurityController>,
    registry: Arc<ProviderRegistry>,
    catalog: Arc<dyn ConnectionCatalog>,
    app_config: Arc<AppConfigHolder>,
    role_cache: RoleCache,
    configurators: Vec<Arc<dyn ServerConfigurator>>,
    policy: AdminPolicy,
}

impl fmt::Debug for AdminAccessService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAccessService")
            .field("role_cache", &self.role_cache)
            .field("configurators", &self.configurators)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn finish<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::debug!(operation, kind = e.kind().as_str(), error = %e, "Admin operation failed");
    }

    #[cfg(feature = "metrics")]
    crate::observability::record_admin_operation(
        operation,
        result.as_ref().map_or_else(|e| e.kind().as_str(), |_| "success"),
    );

    result
}

impl AdminAccessService {
    pub fn new(
        store: Arc<dyn SecurityController>,
        registry: Arc<ProviderRegistry>,
        catalog: Arc<dyn ConnectionCatalog>,
        app_config: Arc<AppConfigHolder>,
    ) -> Self {
        Self {
            store,
            registry,
            catalog,
            app_config,
            role_cache: RoleCache::default(),
            configurators: Vec::new(),
            policy: AdminPolicy::new(),
        }
    }

    #[must_use]
    pub fn with_role_cache(mut self, role_cache: RoleCache) -> Self {
        self.role_cache = role_cache;
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: AdminPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_configurator(mut self, configurator: Arc<dyn ServerConfigurator>) -> Self {
        self.configurators.push(configurator);
        self
    }

    #[must_use]
    pub const fn role_cache(&self) -> &RoleCache {
        &self.role_cache
    }

    /// Authenticated, unexpired identity of `session`; records the access
    fn acting_user(&self, session: &SessionBinding) -> Result<Arc<AuthInfo>> {
        let actor = session.auth_info().ok_or_else(|| {
            Error::NotAuthenticated("administrative operations need an authenticated user".into())
        })?;
        if session.is_expired(self.app_config.server().session_expire_time) {
            return Err(Error::NotAuthenticated(format!(
                "session '{}' has expired",
                session.id()
            )));
        }
        session.touch();
        Ok(actor)
    }

    fn require_admin(&self, session: &SessionBinding) -> Result<Arc<AuthInfo>> {
        let actor = self.acting_user(session)?;
        if self.policy.enforce_admin_permission && !actor.is_admin() {
            return Err(Error::AccessDenied(format!(
                "user '{}' does not have the '{PERMISSION_ADMIN}' permission",
                actor.user_id()
            )));
        }
        Ok(actor)
    }

    async fn require_connection(&self, connection_id: &str) -> Result<()> {
        let exists = self
            .catalog
            .connection_exists(connection_id)
            .await
            .map_err(|e| Error::store("Error reading connection catalog", e))?;
        if exists {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Connection '{connection_id}'")))
        }
    }

    async fn granted_role_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.role_cache
            .get_or_load(user_id, self.store.as_ref())
            .await
            .map_err(|e| Error::store("Error reading user roles", e))
    }

    /// Role ids straight from the store, bypassing the cache
    async fn stored_role_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let roles = self
            .store
            .get_user_roles(user_id)
            .await
            .map_err(|e| Error::store("Error reading user roles", e))?;
        Ok(roles.into_iter().map(|r| r.role_id).collect())
    }

    /// Origin provider of a user; a provider that is no longer registered
    /// yields an origin without a label
    #[must_use]
    pub fn user_origin(&self, user: &Identity) -> UserOrigin {
        let provider_id = user.origin_provider();
        let label = self
            .registry
            .get_provider(provider_id)
            .map(|p| p.label().to_string());
        if label.is_none() {
            tracing::warn!(user = %user.user_id, provider = %provider_id, "Origin provider is not registered");
        }
        UserOrigin {
            provider_id: provider_id.to_string(),
            label,
            space: user.origin_space().map(str::to_string),
        }
    }

    async fn user_info(&self, user: Identity) -> Result<AdminUserInfo> {
        let granted_roles = self.granted_role_ids(&user.user_id).await?;
        let origin = self.user_origin(&user);
        Ok(AdminUserInfo {
            user_id: user.user_id,
            display_name: user.display_name,
            origin,
            granted_roles,
            meta_parameters: user.meta_parameters,
        })
    }

    pub async fn list_users(
        &self,
        session: &SessionBinding,
        pattern: Option<&str>,
    ) -> Result<Vec<AdminUserInfo>> {
        self.require_admin(session)?;
        let users = self
            .store
            .find_users(pattern)
            .await
            .map_err(|e| Error::store("Error reading users", e))?;

        let mut infos = Vec::with_capacity(users.len());
        for user in users {
            infos.push(self.user_info(user).await?);
        }
        Ok(infos)
    }

    pub async fn list_roles(
        &self,
        session: &SessionBinding,
        pattern: Option<&str>,
    ) -> Result<Vec<AdminRoleInfo>> {
        self.require_admin(session)?;
        let roles = self
            .store
            .find_roles(pattern)
            .await
            .map_err(|e| Error::store("Error reading roles", e))?;
        Ok(roles.into_iter().map(AdminRoleInfo::from).collect())
    }

    pub fn list_permissions(&self, session: &SessionBinding) -> Result<Vec<PermissionInfo>> {
        self.require_admin(session)?;
        Ok(self.registry.list_permissions_of_all_services())
    }

    pub async fn create_user(
        &self,
        session: &SessionBinding,
        user_id: &str,
    ) -> Result<AdminUserInfo> {
        let result: Result<AdminUserInfo> = async {
            let actor = self.require_admin(session)?;
            if user_id.is_empty() {
                return Err(Error::InvalidRequest("Empty user name".into()));
            }
            let user = Identity::new(user_id);
            self.store
                .create_user(&user)
                .await
                .map_err(|e| Error::store("Error creating new user", e))?;
            tracing::info!(user = %user_id, actor = %actor.user_id(), "User created");
            self.user_info(user).await
        }
        .await;
        finish("create_user", result)
    }

    pub async fn delete_user(&self, session: &SessionBinding, user_id: &str) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            if actor.user_id() == user_id {
                return Err(Error::SelfOperationForbidden(
                    "You cannot delete yourself".into(),
                ));
            }
            self.store
                .delete_user(user_id)
                .await
                .map_err(|e| Error::store("Error deleting user", e))?;
            self.role_cache.invalidate(user_id);
            tracing::info!(user = %user_id, actor = %actor.user_id(), "User deleted");
            Ok(())
        }
        .await;
        finish("delete_user", result)
    }

    pub async fn create_role(
        &self,
        session: &SessionBinding,
        role_id: &str,
        name: Option<&str>,
    ) -> Result<AdminRoleInfo> {
        let result: Result<AdminRoleInfo> = async {
            let actor = self.require_admin(session)?;
            if role_id.is_empty() {
                return Err(Error::InvalidRequest("Empty role id".into()));
            }
            let mut role = Role::new(role_id);
            role.name = name.map(str::to_string);
            self.store
                .create_role(&role)
                .await
                .map_err(|e| Error::store("Error creating new role", e))?;
            tracing::info!(role = %role_id, actor = %actor.user_id(), "Role created");
            Ok(AdminRoleInfo::from(role))
        }
        .await;
        finish("create_role", result)
    }

    pub async fn delete_role(&self, session: &SessionBinding, role_id: &str) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            let held = self.stored_role_ids(actor.user_id()).await?;
            if held.iter().any(|r| r == role_id) {
                return Err(Error::SelfOperationForbidden(
                    "You can not delete your own role".into(),
                ));
            }
            self.store
                .delete_role(role_id)
                .await
                .map_err(|e| Error::store("Error deleting role", e))?;
            // any user may have held it
            self.role_cache.clear();
            tracing::info!(role = %role_id, actor = %actor.user_id(), "Role deleted");
            Ok(())
        }
        .await;
        finish("delete_role", result)
    }

    pub async fn grant_user_role(
        &self,
        session: &SessionBinding,
        user_id: &str,
        role_id: &str,
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            if actor.user_id() == user_id {
                return Err(Error::SelfOperationForbidden(
                    "You cannot edit your own permissions".into(),
                ));
            }
            let mut roles = self.stored_role_ids(user_id).await?;
            if roles.iter().any(|r| r == role_id) {
                return Err(Error::AlreadyGranted {
                    user: user_id.to_string(),
                    role: role_id.to_string(),
                });
            }
            roles.push(role_id.to_string());
            self.store
                .set_user_roles(user_id, &roles, actor.user_id())
                .await
                .map_err(|e| Error::store("Error granting role", e))?;
            self.role_cache.invalidate(user_id);
            tracing::info!(user = %user_id, role = %role_id, actor = %actor.user_id(), "Role granted");
            Ok(())
        }
        .await;
        finish("grant_user_role", result)
    }

    pub async fn revoke_user_role(
        &self,
        session: &SessionBinding,
        user_id: &str,
        role_id: &str,
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            if actor.user_id() == user_id {
                return Err(Error::SelfOperationForbidden(
                    "You cannot edit your own permissions".into(),
                ));
            }
            let mut roles = self.stored_role_ids(user_id).await?;
            let Some(pos) = roles.iter().position(|r| r == role_id) else {
                return Err(Error::NotGranted {
                    user: user_id.to_string(),
                    role: role_id.to_string(),
                });
            };
            roles.remove(pos);
            self.store
                .set_user_roles(user_id, &roles, actor.user_id())
                .await
                .map_err(|e| Error::store("Error revoking role", e))?;
            self.role_cache.invalidate(user_id);
            tracing::info!(user = %user_id, role = %role_id, actor = %actor.user_id(), "Role revoked");
            Ok(())
        }
        .await;
        finish("revoke_user_role", result)
    }

    pub async fn get_granted_roles(
        &self,
        session: &SessionBinding,
        user_id: &str,
    ) -> Result<Vec<String>> {
        self.require_admin(session)?;
        self.granted_role_ids(user_id).await
    }

    pub async fn get_subject_permissions(
        &self,
        session: &SessionBinding,
        subject_id: &str,
    ) -> Result<Vec<String>> {
        self.require_admin(session)?;
        let permissions = self
            .store
            .get_subject_permissions(subject_id)
            .await
            .map_err(|e| Error::store("Error reading permissions", e))?;
        Ok(permissions.into_iter().collect())
    }

    /// Replace the permissions granted directly to a user or role
    pub async fn set_subject_permissions(
        &self,
        session: &SessionBinding,
        subject_id: &str,
        permissions: &[String],
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            if actor.user_id() == subject_id {
                return Err(Error::SelfOperationForbidden(
                    "You cannot edit your own permissions".into(),
                ));
            }
            if let Some(unknown) = permissions.iter().find(|p| !self.registry.has_permission(p)) {
                return Err(Error::NotFound(format!("Permission '{unknown}'")));
            }
            self.store
                .set_subject_permissions(subject_id, permissions, actor.user_id())
                .await
                .map_err(|e| Error::store("Error setting permissions", e))?;
            tracing::info!(subject = %subject_id, count = permissions.len(), actor = %actor.user_id(), "Permissions replaced");
            Ok(())
        }
        .await;
        finish("set_subject_permissions", result)
    }

    /// Store credentials of `user_id` for a provider; local credentials always
    /// carry the user id as the `user` key
    pub async fn set_user_credentials(
        &self,
        session: &SessionBinding,
        user_id: &str,
        provider_id: &str,
        credentials: Credentials,
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            if self.registry.get_provider(provider_id).is_none() {
                return Err(Error::UnknownProvider(provider_id.to_string()));
            }
            let mut credentials = credentials;
            if provider_id == PROVIDER_LOCAL {
                credentials.insert(CRED_USER, user_id);
            }
            self.store
                .set_user_credentials(user_id, provider_id, &credentials)
                .await
                .map_err(|e| Error::store("Error setting user credentials", e))?;
            tracing::info!(user = %user_id, provider = %provider_id, actor = %actor.user_id(), "User credentials updated");
            Ok(())
        }
        .await;
        finish("set_user_credentials", result)
    }

    pub async fn get_connection_subject_access(
        &self,
        session: &SessionBinding,
        connection_id: &str,
    ) -> Result<Vec<ConnectionGrant>> {
        self.require_admin(session)?;
        self.store
            .get_connection_subject_access(connection_id)
            .await
            .map_err(|e| Error::store("Error reading connection access", e))
    }

    /// Replace the subjects allowed to use a connection
    pub async fn set_connection_subject_access(
        &self,
        session: &SessionBinding,
        connection_id: &str,
        subject_ids: &[String],
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            self.require_connection(connection_id).await?;
            self.store
                .set_connection_subject_access(connection_id, subject_ids, Some(actor.user_id()))
                .await
                .map_err(|e| Error::store("Error setting connection access", e))?;
            tracing::info!(connection = %connection_id, subjects = subject_ids.len(), actor = %actor.user_id(), "Connection access replaced");
            Ok(())
        }
        .await;
        finish("set_connection_subject_access", result)
    }

    pub async fn get_subject_connection_access(
        &self,
        session: &SessionBinding,
        subject_id: &str,
    ) -> Result<Vec<ConnectionGrant>> {
        self.require_admin(session)?;
        self.store
            .get_subject_connection_access(&[subject_id.to_string()])
            .await
            .map_err(|e| Error::store("Error reading connection access", e))
    }

    /// Replace the connections a subject may use
    pub async fn set_subject_connection_access(
        &self,
        session: &SessionBinding,
        subject_id: &str,
        connection_ids: &[String],
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = self.require_admin(session)?;
            try_join_all(connection_ids.iter().map(|c| self.require_connection(c))).await?;
            self.store
                .set_subject_connection_access(subject_id, connection_ids, actor.user_id())
                .await
                .map_err(|e| Error::store("Error setting connection access", e))?;
            tracing::info!(subject = %subject_id, connections = connection_ids.len(), actor = %actor.user_id(), "Subject access replaced");
            Ok(())
        }
        .await;
        finish("set_subject_connection_access", result)
    }

    /// Grants reaching a user directly or through any of its roles
    pub async fn get_granted_connections(
        &self,
        session: &SessionBinding,
        user_id: &str,
    ) -> Result<Vec<ConnectionGrant>> {
        self.require_admin(session)?;
        let mut subjects = self.granted_role_ids(user_id).await?;
        subjects.insert(0, user_id.to_string());
        self.store
            .get_subject_connection_access(&subjects)
            .await
            .map_err(|e| Error::store("Error reading connection access", e))
    }

    /// Drop every grant of a connection the catalog no longer has
    pub async fn connection_removed(&self, connection_id: &str) {
        if let Err(e) = self
            .store
            .set_connection_subject_access(connection_id, &[], None)
            .await
        {
            tracing::warn!(connection = %connection_id, error = %e, "Failed to clear connection grants");
        }
    }

    /// Configuration wizard.
    ///
    /// Patches the application configuration, runs every registered
    /// [`ServerConfigurator`], makes sure the administrator account exists
    /// with the `admin` role, stores the new configuration and refreshes the
    /// acting session. Anyone may run it while the server is unconfigured;
    /// afterwards it is an administrative operation.
    pub async fn configure_server(
        &self,
        session: &SessionBinding,
        request: ServerConfigRequest,
    ) -> Result<()> {
        let result: Result<()> = async {
            let actor = if self.app_config.is_configured() {
                Some(self.require_admin(session)?)
            } else {
                session.active_auth_info(self.app_config.server().session_expire_time)
            };

            let mut app = (*self.app_config.app()).clone();
            if let Some(enabled) = request.anonymous_access_enabled {
                app.anonymous_access_enabled = enabled;
            }
            if let Some(enabled) = request.authentication_enabled {
                app.authentication_enabled = enabled;
            }
            if let Some(enabled) = request.custom_connections_enabled {
                app.supports_custom_connections = enabled;
            }

            let requested_admin = request
                .admin_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty());
            let (admin_name, admin_password) = match (requested_admin, &actor) {
                (Some(name), _) => (name.to_string(), request.admin_password.clone()),
                (None, Some(actor)) => (actor.user_id().to_string(), None),
                (None, None) => {
                    return Err(Error::InvalidRequest(
                        "Administrator name is not specified".into(),
                    ));
                }
            };

            for configurator in &self.configurators {
                if let Err(e) = configurator.configure_server(&request, &mut app).await {
                    tracing::warn!(configurator = %configurator.id(), error = %e, "Server configurator failed");
                }
            }

            let mut server = (*self.app_config.server()).clone();
            if let Some(name) = request.server_name.as_deref().filter(|n| !n.trim().is_empty()) {
                server.server_name = name.to_string();
            }
            if let Some(secs) = request.session_expire_secs.filter(|s| *s > 0) {
                server.session_expire_time = Duration::from_secs(secs);
            }
            server.configured = true;

            let granted_by = actor
                .as_ref()
                .map_or_else(|| admin_name.clone(), |a| a.user_id().to_string());
            self.ensure_admin_account(&admin_name, admin_password.as_deref(), &granted_by)
                .await?;

            self.app_config.store_app(app);
            self.app_config.store_server(server);

            session
                .force_refresh(self.store.as_ref())
                .await
                .map_err(|e| Error::store("Error refreshing session", e))?;

            tracing::info!(admin = %admin_name, "Server configuration updated");
            Ok(())
        }
        .await;
        finish("configure_server", result)
    }

    async fn ensure_admin_account(
        &self,
        admin_name: &str,
        password: Option<&str>,
        granted_by: &str,
    ) -> Result<()> {
        let store = self.store.as_ref();
        let wrap = |e| Error::store("Error creating administrator", e);

        let admin_role_exists = store
            .find_roles(Some(ROLE_ADMIN))
            .await
            .map_err(wrap)?
            .iter()
            .any(|r| r.role_id == ROLE_ADMIN);
        if admin_role_exists {
            let mut permissions = store.get_subject_permissions(ROLE_ADMIN).await.map_err(wrap)?;
            if permissions.insert(PERMISSION_ADMIN.to_string()) {
                let permissions: Vec<String> = permissions.into_iter().collect();
                store
                    .set_subject_permissions(ROLE_ADMIN, &permissions, granted_by)
                    .await
                    .map_err(wrap)?;
            }
        } else {
            let role = Role::new(ROLE_ADMIN)
                .with_name("Administrator")
                .with_permissions([PERMISSION_ADMIN]);
            store.create_role(&role).await.map_err(wrap)?;
        }

        let user_exists = store
            .find_users(Some(admin_name))
            .await
            .map_err(wrap)?
            .iter()
            .any(|u| u.user_id == admin_name);
        if !user_exists {
            let mut admin = Identity::new(admin_name);
            admin.set_origin(PROVIDER_LOCAL, None);
            store.create_user(&admin).await.map_err(wrap)?;
        }

        if let Some(password) = password {
            let credentials = Credentials::new()
                .with(CRED_USER, admin_name)
                .with(CRED_PASSWORD, password);
            store
                .set_user_credentials(admin_name, PROVIDER_LOCAL, &credentials)
                .await
                .map_err(wrap)?;
        }

        let mut roles = self.stored_role_ids(admin_name).await?;
        if !roles.iter().any(|r| r == ROLE_ADMIN) {
            roles.push(ROLE_ADMIN.to_string());
            store
                .set_user_roles(admin_name, &roles, granted_by)
                .await
                .map_err(wrap)?;
        }
        self.role_cache.invalidate(admin_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::config::AppConfig;
    use crate::error::ErrorKind;
    use crate::provider::{BasicSession, LocalAuthProvider, ServiceDescriptor};
    use crate::session::SessionState;
    use crate::store::{MemorySecurityController, StaticConnectionCatalog};

    struct Fixture {
        service: AdminAccessService,
        store: Arc<MemorySecurityController>,
        registry: Arc<ProviderRegistry>,
        catalog: StaticConnectionCatalog,
        app_config: Arc<AppConfigHolder>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemorySecurityController::new());
        let registry = Arc::new(
            ProviderRegistry::builder()
                .provider(LocalAuthProvider::descriptor().unwrap())
                .service(ServiceDescriptor::core())
                .build()
                .unwrap(),
        );
        let catalog = StaticConnectionCatalog::new(["pg-main", "pg-reports"]);
        let app_config = Arc::new(AppConfigHolder::default());
        let service = AdminAccessService::new(
            store.clone(),
            registry.clone(),
            Arc::new(catalog.clone()),
            app_config.clone(),
        );
        Fixture {
            service,
            store,
            registry,
            catalog,
            app_config,
        }
    }

    /// Seeds `root` (admin), `alice` and the `admin` and `user` roles
    async fn seeded() -> Fixture {
        let fx = fixture();
        let store = fx.store.as_ref();
        store
            .create_role(&Role::new(ROLE_ADMIN).with_permissions([PERMISSION_ADMIN]))
            .await
            .unwrap();
        store.create_role(&Role::new("user")).await.unwrap();
        store.create_user(&Identity::new("root")).await.unwrap();
        store.create_user(&Identity::new("alice")).await.unwrap();
        store
            .set_user_roles("root", &[ROLE_ADMIN.to_string()], "test")
            .await
            .unwrap();
        fx
    }

    async fn session_for(fx: &Fixture, user_id: &str) -> SessionBinding {
        let permissions = fx.store.get_user_permissions(user_id).await.unwrap();
        let session = SessionBinding::new(format!("session-{user_id}"));
        let info = AuthInfo::new(
            Identity::new(user_id),
            fx.registry.get_provider(PROVIDER_LOCAL).unwrap().info(),
            Arc::new(BasicSession::new(PROVIDER_LOCAL, session.id())),
            permissions,
        );
        session.bind(Arc::new(info)).await;
        session
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[tokio::test]
    async fn test_anonymous_session_is_rejected() {
        let fx = seeded().await;
        let anonymous = SessionBinding::new("anon");
        let err = fx.service.list_users(&anonymous, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;
        fx.service.list_users(&root, None).await.unwrap();

        let mut server = (*fx.app_config.server()).clone();
        server.session_expire_time = Duration::from_millis(1);
        fx.app_config.store_server(server);
        std::thread::sleep(Duration::from_millis(20));

        let err = fx.service.list_users(&root, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_non_admin_is_denied_when_enforced() {
        let fx = seeded().await;
        let alice = session_for(&fx, "alice").await;
        let err = fx.service.list_roles(&alice, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let relaxed = fx.service.with_policy(AdminPolicy {
            enforce_admin_permission: false,
        });
        let roles = relaxed.list_roles(&alice, None).await.unwrap();
        assert_eq!(roles.len(), 2);
    }

    #[tokio::test]
    async fn test_create_user_rejects_empty_and_duplicate() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let err = fx.service.create_user(&root, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("Empty user name"));

        let bob = fx.service.create_user(&root, "bob").await.unwrap();
        assert_eq!(bob.user_id, "bob");
        assert_eq!(bob.origin.provider_id, PROVIDER_LOCAL);
        assert_eq!(bob.origin.label.as_deref(), Some("Local"));
        assert!(bob.granted_roles.is_empty());

        let err = fx.service.create_user(&root, "bob").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(err.to_string(), "User 'bob' already exists");
    }

    #[tokio::test]
    async fn test_delete_self_is_forbidden() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let err = fx.service.delete_user(&root, "root").await.unwrap_err();
        assert!(err.is_self_operation());
        assert_eq!(err.to_string(), "You cannot delete yourself");

        fx.service.delete_user(&root, "alice").await.unwrap();
        let err = fx.service.delete_user(&root, "alice").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_own_role_is_forbidden() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let err = fx.service.delete_role(&root, ROLE_ADMIN).await.unwrap_err();
        assert!(err.is_self_operation());
        assert_eq!(err.to_string(), "You can not delete your own role");

        fx.service
            .grant_user_role(&root, "alice", "user")
            .await
            .unwrap();
        assert_eq!(
            fx.service.get_granted_roles(&root, "alice").await.unwrap(),
            vec!["user"]
        );
        fx.service.delete_role(&root, "user").await.unwrap();
        assert!(fx.service.role_cache().is_empty());
        assert!(
            fx.service
                .get_granted_roles(&root, "alice")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_create_role() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let role = fx
            .service
            .create_role(&root, "analyst", Some("Analysts"))
            .await
            .unwrap();
        assert_eq!(role.role_id, "analyst");
        assert_eq!(role.name.as_deref(), Some("Analysts"));

        let err = fx.service.create_role(&root, "analyst", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        let err = fx.service.create_role(&root, "", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_grant_revoke_round_trip() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        fx.service
            .grant_user_role(&root, "alice", "user")
            .await
            .unwrap();
        let err = fx
            .service
            .grant_user_role(&root, "alice", "user")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyGranted);

        fx.service
            .revoke_user_role(&root, "alice", "user")
            .await
            .unwrap();
        assert!(fx.store.get_user_roles("alice").await.unwrap().is_empty());

        let err = fx
            .service
            .revoke_user_role(&root, "alice", "user")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotGranted);
    }

    #[tokio::test]
    async fn test_grant_to_self_is_forbidden() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let err = fx
            .service
            .grant_user_role(&root, "root", "user")
            .await
            .unwrap_err();
        assert!(err.is_self_operation());
        let err = fx
            .service
            .revoke_user_role(&root, "root", ROLE_ADMIN)
            .await
            .unwrap_err();
        assert!(err.is_self_operation());
        assert_eq!(fx.store.get_user_roles("root").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grant_unknown_role_is_not_found() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;
        let err = fx
            .service
            .grant_user_role(&root, "alice", "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_grant_invalidates_cached_roles() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        assert!(
            fx.service
                .get_granted_roles(&root, "alice")
                .await
                .unwrap()
                .is_empty()
        );
        fx.service
            .grant_user_role(&root, "alice", "user")
            .await
            .unwrap();
        assert_eq!(
            fx.service.get_granted_roles(&root, "alice").await.unwrap(),
            vec!["user"]
        );
        assert!(fx.service.role_cache().stats().invalidations >= 1);
    }

    #[tokio::test]
    async fn test_set_subject_permissions() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let err = fx
            .service
            .set_subject_permissions(&root, "root", &ids(&[PERMISSION_ADMIN]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You cannot edit your own permissions");

        let err = fx
            .service
            .set_subject_permissions(&root, "user", &ids(&["fly"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        fx.service
            .set_subject_permissions(&root, "user", &ids(&["public"]))
            .await
            .unwrap();
        assert_eq!(
            fx.service
                .get_subject_permissions(&root, "user")
                .await
                .unwrap(),
            vec!["public"]
        );
    }

    #[tokio::test]
    async fn test_set_local_credentials_injects_user() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        fx.service
            .set_user_credentials(
                &root,
                "alice",
                PROVIDER_LOCAL,
                Credentials::new().with(CRED_PASSWORD, "s3cret"),
            )
            .await
            .unwrap();
        let stored = fx
            .store
            .get_user_credentials("alice", PROVIDER_LOCAL)
            .await
            .unwrap();
        assert_eq!(stored.get_str(CRED_USER), Some("alice"));
        assert_eq!(stored.get_str(CRED_PASSWORD), Some("s3cret"));

        let err = fx
            .service
            .set_user_credentials(&root, "alice", "kerberos", Credentials::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownProvider);
    }

    #[tokio::test]
    async fn test_missing_connection_is_rejected_before_mutation() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        fx.service
            .set_subject_connection_access(&root, "alice", &ids(&["pg-main"]))
            .await
            .unwrap();

        let err = fx
            .service
            .set_connection_subject_access(&root, "conn-missing", &ids(&["alice"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Connection 'conn-missing' not found");

        let err = fx
            .service
            .set_subject_connection_access(&root, "alice", &ids(&["pg-reports", "conn-missing"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let grants = fx
            .service
            .get_subject_connection_access(&root, "alice")
            .await
            .unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].connection_id, "pg-main");
    }

    #[tokio::test]
    async fn test_granted_connections_include_roles() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        fx.service
            .grant_user_role(&root, "alice", "user")
            .await
            .unwrap();
        fx.service
            .set_connection_subject_access(&root, "pg-main", &ids(&["user"]))
            .await
            .unwrap();
        fx.service
            .set_connection_subject_access(&root, "pg-reports", &ids(&["alice"]))
            .await
            .unwrap();

        let grants = fx
            .service
            .get_granted_connections(&root, "alice")
            .await
            .unwrap();
        let mut connections: Vec<_> = grants.iter().map(|g| g.connection_id.as_str()).collect();
        connections.sort_unstable();
        assert_eq!(connections, vec!["pg-main", "pg-reports"]);

        let by_connection = fx
            .service
            .get_connection_subject_access(&root, "pg-main")
            .await
            .unwrap();
        assert_eq!(by_connection[0].granted_by.as_deref(), Some("root"));
    }

    #[tokio::test]
    async fn test_connection_removed_drops_grants() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        fx.service
            .set_connection_subject_access(&root, "pg-main", &ids(&["alice", "user"]))
            .await
            .unwrap();
        fx.catalog.remove("pg-main");
        fx.service.connection_removed("pg-main").await;

        assert!(
            fx.service
                .get_connection_subject_access(&root, "pg-main")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_list_users_reports_origin_and_roles() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;

        let mut sso_user = Identity::new("carol");
        sso_user.set_origin("sso", Some("corp"));
        fx.store.create_user(&sso_user).await.unwrap();

        let users = fx.service.list_users(&root, None).await.unwrap();
        assert_eq!(users.len(), 3);

        let root_info = users.iter().find(|u| u.user_id == "root").unwrap();
        assert_eq!(root_info.granted_roles, vec![ROLE_ADMIN]);

        let carol = users.iter().find(|u| u.user_id == "carol").unwrap();
        assert_eq!(carol.origin.provider_id, "sso");
        assert!(carol.origin.label.is_none());
        assert_eq!(carol.origin.space.as_deref(), Some("corp"));

        let filtered = fx.service.list_users(&root, Some("al*")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(fx.service.role_cache().stats().hits >= 1);
    }

    #[tokio::test]
    async fn test_list_permissions() {
        let fx = seeded().await;
        let root = session_for(&fx, "root").await;
        let permissions = fx.service.list_permissions(&root).unwrap();
        assert!(permissions.iter().any(|p| p.id == PERMISSION_ADMIN));
    }

    #[derive(Debug, Default)]
    struct PluginConfigurator {
        fail: AtomicBool,
    }

    #[async_trait]
    impl ServerConfigurator for PluginConfigurator {
        fn id(&self) -> &str {
            "plugin"
        }

        async fn configure_server(
            &self,
            _request: &ServerConfigRequest,
            app_config: &mut AppConfig,
        ) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Config("plugin rejected the configuration".into()));
            }
            app_config.set_plugin_option("plugin", "ready", json!(true));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_configure_unconfigured_server_anonymously() {
        let fx = fixture();
        let service = fx
            .service
            .with_configurator(Arc::new(PluginConfigurator::default()));
        let anonymous = SessionBinding::new("anon");

        service
            .configure_server(
                &anonymous,
                ServerConfigRequest {
                    server_name: Some("Analytics".into()),
                    session_expire_secs: Some(600),
                    admin_name: Some("root".into()),
                    admin_password: Some("s3cret".into()),
                    anonymous_access_enabled: Some(false),
                    ..ServerConfigRequest::default()
                },
            )
            .await
            .unwrap();

        assert!(fx.app_config.is_configured());
        let server = fx.app_config.server();
        assert_eq!(server.server_name, "Analytics");
        assert_eq!(server.session_expire_time, Duration::from_secs(600));
        let app = fx.app_config.app();
        assert!(!app.anonymous_access_enabled);
        assert_eq!(app.plugin_option("plugin", "ready"), Some(&json!(true)));

        let roles = fx.store.get_user_roles("root").await.unwrap();
        assert_eq!(roles[0].role_id, ROLE_ADMIN);
        assert!(roles[0].permissions.contains(PERMISSION_ADMIN));
        let credentials = fx
            .store
            .get_user_credentials("root", PROVIDER_LOCAL)
            .await
            .unwrap();
        assert_eq!(credentials.get_str(CRED_PASSWORD), Some("s3cret"));
        assert_eq!(anonymous.state(), SessionState::Anonymous);

        let err = service
            .configure_server(&anonymous, ServerConfigRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_configure_requires_admin_name() {
        let fx = fixture();
        let anonymous = SessionBinding::new("anon");
        let err = fx
            .service
            .configure_server(&anonymous, ServerConfigRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(!fx.app_config.is_configured());
    }

    #[tokio::test]
    async fn test_reconfigure_falls_back_to_acting_admin() {
        let fx = seeded().await;
        let alice = session_for(&fx, "alice").await;
        let root = session_for(&fx, "root").await;
        let mut server = (*fx.app_config.server()).clone();
        server.configured = true;
        fx.app_config.store_server(server);
        let service = fx.service.with_configurator(Arc::new(PluginConfigurator {
            fail: AtomicBool::new(true),
        }));

        let err = service
            .configure_server(&alice, ServerConfigRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        service
            .configure_server(
                &root,
                ServerConfigRequest {
                    authentication_enabled: Some(false),
                    ..ServerConfigRequest::default()
                },
            )
            .await
            .unwrap();

        assert!(!fx.app_config.authentication_enabled());
        assert!(fx.app_config.app().plugin_option("plugin", "ready").is_none());
        assert!(root.has_permission(PERMISSION_ADMIN));
        assert_eq!(fx.store.find_users(None).await.unwrap().len(), 2);
    }
}
