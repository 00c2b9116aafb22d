//! Provider error types

use thiserror::Error;

use crate::store::StoreError;

/// Failures raised by provider implementations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("missing credential '{0}'")]
    MissingCredential(String),

    #[error("identity backend unavailable: {0}")]
    Unavailable(String),

    #[error("user registration failed: {0}")]
    Registration(String),

    #[error("invalid provider configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
