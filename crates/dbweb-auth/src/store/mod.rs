//! Security store abstraction
//!
//! The authentication core persists nothing itself. Users, roles,
//! permissions, credentials and connection grants live behind
//! [`SecurityController`]; the connection catalog is consulted through
//! [`ConnectionCatalog`] only to validate ids.
//!
//! [`MemorySecurityController`] is a complete in-process implementation used
//! by tests and single-node deployments.

mod catalog;
mod controller;
mod error;
mod memory;

pub use catalog::{ConnectionCatalog, StaticConnectionCatalog};
pub use controller::SecurityController;
pub use error::{StoreError, StoreResult};
pub use memory::MemorySecurityController;
