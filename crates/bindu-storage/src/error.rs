//! Unified error types for storage operations.

use bindu_a2a_protocol::TaskState;
use uuid::Uuid;

/// Unified error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Context not found: {0}")]
    ContextNotFound(Uuid),

    #[error("Invalid state transition: {current} -> {requested}")]
    InvalidTransition {
        current: TaskState,
        requested: TaskState,
    },

    #[error("Task is in terminal state: {0}")]
    TerminalState(TaskState),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Generic(String),
}

impl StorageError {
    /// Transient failures are retried by the caller's retry policy;
    /// everything else is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Database(_) | StorageError::Timeout(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StorageError::Timeout(err.to_string()),
            other => StorageError::Database(other.to_string()),
        }
    }
}
