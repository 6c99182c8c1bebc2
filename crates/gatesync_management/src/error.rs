//! Error types for management use cases.

use gatesync_protocol::ProtocolError;
use gatesync_repository::RepositoryError;
use thiserror::Error;

/// Result type for management operations.
pub type ManagementResult<T> = Result<T, ManagementError>;

/// Errors surfaced to callers of management use cases.
///
/// None of them is ever published as an event.
#[derive(Error, Debug)]
pub enum ManagementError {
    /// The entity does not exist for the caller's environment.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// Requested ID.
        id: String,
    },

    /// The request is invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A store call failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// An event could not be built.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ManagementError {
    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns true if the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ManagementError::NotFound { .. } | ManagementError::Validation(_)
        )
    }
}
