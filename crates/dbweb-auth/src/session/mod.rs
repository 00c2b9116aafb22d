//! Session-to-identity binding
//!
//! A session starts `Anonymous`, becomes `Authenticated` on login and returns
//! to `Anonymous` on logout or when a forced refresh finds the user gone.

mod auth_info;
mod binding;

pub use auth_info::AuthInfo;
pub use binding::{SessionBinding, SessionState};
