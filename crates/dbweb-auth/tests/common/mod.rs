//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dbweb_auth::constants::{CRED_PASSWORD, CRED_USER, DEFAULT_USER_ROLE, PROVIDER_LOCAL};
use dbweb_auth::provider::{
    AuthProvider, BasicSession, ConfigSchema, ExternalAuthAdapter, LocalAuthProvider,
    PropertyDescriptor, ProviderConfig, ProviderDescriptor, ProviderError, ProviderRegistry,
    ProviderResult, ProviderSession, ServiceDescriptor,
};
use dbweb_auth::store::{MemorySecurityController, SecurityController, StaticConnectionCatalog};
use dbweb_auth::{AuthInfo, AuthServer, Config, Credentials, Identity, Role, SessionBinding};

pub const SSO_PROVIDER: &str = "sso";
pub const ADMIN_NAME: &str = "root";
pub const ADMIN_PASSWORD: &str = "s3cret";

/// Directory accepting `token = "tok-<subject>"`
#[derive(Debug, Default)]
pub struct TokenDirectory {
    registrations: AtomicUsize,
}

impl TokenDirectory {
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalAuthAdapter for TokenDirectory {
    async fn normalize_credentials(
        &self,
        _config: &ProviderConfig,
        raw: &Credentials,
    ) -> ProviderResult<Credentials> {
        let token = raw
            .get_str("token")
            .ok_or_else(|| ProviderError::MissingCredential("token".into()))?;
        let subject = token
            .strip_prefix("tok-")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::InvalidCredentials("token rejected".into()))?;
        Ok(Credentials::new().with("subject", subject))
    }

    async fn auto_register(
        &self,
        store: &dyn SecurityController,
        config: &ProviderConfig,
        credentials: &Credentials,
    ) -> ProviderResult<Identity> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let subject = credentials
            .get_str("subject")
            .ok_or_else(|| ProviderError::MissingCredential("subject".into()))?;

        let mut identity = Identity::new(subject);
        identity.set_origin(SSO_PROVIDER, config.get_str("domain"));
        store.create_user(&identity).await?;
        store
            .set_user_credentials(subject, SSO_PROVIDER, credentials)
            .await?;
        store
            .set_user_roles(subject, &[DEFAULT_USER_ROLE.to_string()], SSO_PROVIDER)
            .await?;
        Ok(identity)
    }

    async fn display_name(
        &self,
        _config: &ProviderConfig,
        credentials: &Credentials,
    ) -> ProviderResult<Option<String>> {
        Ok(credentials
            .get_str("subject")
            .map(|s| format!("{s} (directory)")))
    }
}

#[derive(Debug)]
pub struct TokenProvider;

#[async_trait]
impl AuthProvider for TokenProvider {
    async fn open_session(
        &self,
        session_id: &str,
        _config: &ProviderConfig,
        _stored: &Credentials,
        _presented: &Credentials,
    ) -> ProviderResult<Arc<dyn ProviderSession>> {
        Ok(Arc::new(BasicSession::new(SSO_PROVIDER, session_id)))
    }
}

pub struct Harness {
    pub server: AuthServer,
    pub store: Arc<MemorySecurityController>,
    pub catalog: StaticConnectionCatalog,
    pub directory: Arc<TokenDirectory>,
}

/// Bootstrapped server with `local` and `sso` providers, admin `root`, a
/// `user` role and connections `pg-main` and `pg-reports`
pub async fn harness() -> Harness {
    let directory = Arc::new(TokenDirectory::default());
    let sso = ProviderDescriptor::builder(SSO_PROVIDER, "Corporate SSO", Arc::new(TokenProvider))
        .description("Token based single sign-on")
        .config_schema(
            ConfigSchema::new()
                .with_property(PropertyDescriptor::string("domain", "Domain").required()),
        )
        .config_value("domain", "corp")
        .external(directory.clone())
        .build()
        .unwrap();
    let registry = ProviderRegistry::builder()
        .service(ServiceDescriptor::core())
        .provider(LocalAuthProvider::descriptor().unwrap())
        .provider(sso)
        .build()
        .unwrap();

    let config = Config::builder()
        .admin_name(ADMIN_NAME.to_string())
        .admin_password(ADMIN_PASSWORD.to_string())
        .build()
        .unwrap();
    let store = Arc::new(MemorySecurityController::new());
    let catalog = StaticConnectionCatalog::new(["pg-main", "pg-reports"]);
    let server = AuthServer::new(
        config,
        store.clone(),
        Arc::new(catalog.clone()),
        registry,
    );
    server.bootstrap().await.unwrap();
    store
        .create_role(&Role::new(DEFAULT_USER_ROLE).with_name("Users"))
        .await
        .unwrap();

    Harness {
        server,
        store,
        catalog,
        directory,
    }
}

pub fn local_credentials(user: &str, password: &str) -> Credentials {
    Credentials::new()
        .with(CRED_USER, user)
        .with(CRED_PASSWORD, password)
}

pub async fn login_local(
    server: &AuthServer,
    user: &str,
    password: &str,
) -> (SessionBinding, dbweb_auth::Result<Arc<AuthInfo>>) {
    let session = server.new_session();
    let result = server
        .orchestrator()
        .login(&session, PROVIDER_LOCAL, local_credentials(user, password))
        .await;
    (session, result)
}

pub async fn admin_session(server: &AuthServer) -> SessionBinding {
    let (session, result) = login_local(server, ADMIN_NAME, ADMIN_PASSWORD).await;
    result.unwrap();
    session
}

pub async fn login_token(
    server: &AuthServer,
    token: &str,
) -> (SessionBinding, dbweb_auth::Result<Arc<AuthInfo>>) {
    let session = server.new_session();
    let result = server
        .orchestrator()
        .login(
            &session,
            SSO_PROVIDER,
            Credentials::new().with("token", token),
        )
        .await;
    (session, result)
}
