//! Administrative access control
//!
//! [`AdminAccessService`] manages users, roles, permission grants, stored
//! credentials and connection access on top of a
//! [`SecurityController`](crate::store::SecurityController), and runs the
//! server configuration wizard.

mod configurator;
mod service;
mod types;

pub use configurator::ServerConfigurator;
pub use service::{AdminAccessService, AdminPolicy};
pub use types::{AdminRoleInfo, AdminUserInfo, ServerConfigRequest, UserOrigin};
