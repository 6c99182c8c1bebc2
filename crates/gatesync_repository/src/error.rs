//! Error types for repositories.

use thiserror::Error;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors returned by stores.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The backing store could not be reached.
    #[error("{store} store unavailable: {message}")]
    Unavailable {
        /// Store name.
        store: &'static str,
        /// Error message.
        message: String,
    },

    /// A record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Record kind.
        entity: &'static str,
        /// Record ID.
        id: String,
    },

    /// A record already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    /// Creates an unavailable-store error.
    pub fn unavailable(store: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            store,
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable { .. } | RepositoryError::Io(_))
    }
}
