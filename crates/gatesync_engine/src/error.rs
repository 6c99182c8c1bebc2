//! Error types for the synchronization engine.

use gatesync_protocol::ProtocolError;
use gatesync_repository::RepositoryError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A store call failed. Aborts the current run.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// A value could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration rejected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run could not be scheduled or panicked.
    #[error("executor error: {0}")]
    Executor(String),

    /// The scheduler was shut down.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if the next scheduled run may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Repository(e) => e.is_transient(),
            SyncError::Executor(_) => true,
            _ => false,
        }
    }
}
