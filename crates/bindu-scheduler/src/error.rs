//! Scheduler error types.

/// Unified error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is closed")]
    Closed,

    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Malformed task id in queue: {0}")]
    MalformedTaskId(String),
}

impl SchedulerError {
    /// Transient failures are retried by the backend's retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, SchedulerError::Backend(_))
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for SchedulerError {
    fn from(err: redis::RedisError) -> Self {
        SchedulerError::Backend(err.to_string())
    }
}
