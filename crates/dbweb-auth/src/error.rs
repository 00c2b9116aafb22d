use serde::Serialize;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::store::StoreError;

/// Failure category surfaced to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidRequest,
    UnknownProvider,
    AuthenticationFailed,
    AuthenticationDisabled,
    NotAuthenticated,
    AccessDenied,
    SelfOperationForbidden,
    AlreadyExists,
    AlreadyGranted,
    NotGranted,
    NotFound,
    StoreFailure,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnknownProvider => "unknown_provider",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthenticationDisabled => "authentication_disabled",
            Self::NotAuthenticated => "not_authenticated",
            Self::AccessDenied => "access_denied",
            Self::SelfOperationForbidden => "self_operation_forbidden",
            Self::AlreadyExists => "already_exists",
            Self::AlreadyGranted => "already_granted",
            Self::NotGranted => "not_granted",
            Self::NotFound => "not_found",
            Self::StoreFailure => "store_failure",
            Self::Configuration => "configuration",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid auth provider '{0}'")]
    UnknownProvider(String),

    #[error("{message}")]
    AuthenticationFailed {
        message: String,
        #[source]
        source: Option<ProviderError>,
    },

    #[error("Authentication was disabled for this server")]
    AuthenticationDisabled,

    #[error("Not logged in: {0}")]
    NotAuthenticated(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    SelfOperationForbidden(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("User '{user}' already has role '{role}'")]
    AlreadyGranted { user: String, role: String },

    #[error("User '{user}' doesn't have role '{role}'")]
    NotGranted { user: String, role: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{message}: {source}")]
    StoreFailure {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a store failure with an operation-specific message.
    ///
    /// Duplicate and missing records keep their own kinds so callers can
    /// tell a conflict from a backend outage.
    pub fn store(message: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::Duplicate { entity, id } => Self::AlreadyExists(format!("{entity} '{id}'")),
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} '{id}'")),
            source => Self::StoreFailure {
                message: message.into(),
                source,
            },
        }
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn authentication_failed_with(message: impl Into<String>, source: ProviderError) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::UnknownProvider(_) => ErrorKind::UnknownProvider,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::AuthenticationDisabled => ErrorKind::AuthenticationDisabled,
            Self::NotAuthenticated(_) => ErrorKind::NotAuthenticated,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::SelfOperationForbidden(_) => ErrorKind::SelfOperationForbidden,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::AlreadyGranted { .. } => ErrorKind::AlreadyGranted,
            Self::NotGranted { .. } => ErrorKind::NotGranted,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StoreFailure { .. } => ErrorKind::StoreFailure,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    #[must_use]
    pub const fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::AuthenticationDisabled
                | Self::NotAuthenticated(_)
        )
    }

    #[must_use]
    pub const fn is_self_operation(&self) -> bool {
        matches!(self, Self::SelfOperationForbidden(_))
    }

    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreFailure { .. })
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Structured form handed to the transport layer
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::from(self)
    }
}

/// Kind + message pair exposed to clients; the cause chain is kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        let cause = std::error::Error::source(err).map(ToString::to_string);
        Self {
            kind: err.kind(),
            message: err.to_string(),
            cause,
        }
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
