//! Security store error types

use thiserror::Error;

/// Failures reported by a `SecurityController` implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} '{id}' already exists")]
    Duplicate { entity: &'static str, id: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn duplicate(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            id: id.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
