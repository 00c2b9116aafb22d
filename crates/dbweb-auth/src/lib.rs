//! Authentication and access-control core for a multi-tenant database web
//! backend
//!
//! Pluggable authentication providers log sessions in ([`auth`]), a
//! [`store::SecurityController`] keeps users, roles, permissions and
//! connection grants, and [`admin::AdminAccessService`] manages them.

pub mod admin;
pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
mod error;
pub mod observability;
pub mod provider;
mod server;
pub mod session;
pub mod store;
pub mod types;

pub use admin::{AdminAccessService, AdminPolicy};
pub use auth::AuthOrchestrator;
pub use config::{Config, ConfigBuilder, TelemetryConfig};
pub use error::{Error, ErrorKind, ErrorResponse, Result};
pub use server::{AuthServer, registry_from_config};
pub use session::{AuthInfo, SessionBinding, SessionState};
pub use types::*;
