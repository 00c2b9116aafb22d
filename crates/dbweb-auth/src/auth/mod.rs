//! Authentication flow
//!
//! [`AuthOrchestrator`] resolves the provider, routes external credentials
//! through the provider's adapter, finds or auto-registers the user, opens a
//! provider session and binds the result to the caller's session.

mod orchestrator;

pub use orchestrator::AuthOrchestrator;
