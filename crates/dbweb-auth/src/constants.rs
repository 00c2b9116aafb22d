//! Constants shared by the authentication core

/// Identifier of the built-in local credentials provider
pub const PROVIDER_LOCAL: &str = "local";

/// Local provider credential: user name
pub const CRED_USER: &str = "user";

/// Local provider credential: password
pub const CRED_PASSWORD: &str = "password";

/// User meta parameter holding the id of the provider the user originates from
pub const META_AUTH_PROVIDER: &str = "$provider";

/// User meta parameter holding the provider sub-space (tenant, realm, ...)
pub const META_AUTH_SPACE_ID: &str = "$space";

/// Permission that grants access to administrative operations
pub const PERMISSION_ADMIN: &str = "admin";

/// Permission id for regular access to the public API
pub const PERMISSION_PUBLIC: &str = "public";

/// Role created by the configuration wizard for administrators
pub const ROLE_ADMIN: &str = "admin";

/// Default role name for anonymous and newly created users
pub const DEFAULT_USER_ROLE: &str = "user";

/// Service id of the core (declares the built-in permissions)
pub const CORE_SERVICE_ID: &str = "core";

/// Default server name used until the configuration wizard runs
pub const DEFAULT_SERVER_NAME: &str = "DBWeb Server";

/// Default session lifetime in seconds
pub const DEFAULT_SESSION_EXPIRE_SECS: u64 = 30 * 60;
