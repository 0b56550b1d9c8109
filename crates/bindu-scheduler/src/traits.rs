//! Core scheduler trait.

use crate::error::SchedulerError;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// A durable FIFO of task ids awaiting worker pickup.
///
/// The scheduler carries task ids only, never task bodies — workers load the
/// task from storage after dequeue. Ordering is FIFO in the absence of
/// failures; under multi-worker contention workers may complete out of
/// dequeue order.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Human-readable name of the backend (e.g. "in-memory", "redis").
    fn backend_name(&self) -> &'static str;

    /// Append a task id. On a bounded backend this blocks when the queue is
    /// full, propagating backpressure to the caller.
    async fn enqueue(&self, task_id: Uuid) -> Result<(), SchedulerError>;

    /// Block up to `timeout` for an available id. Returns `None` on timeout
    /// or when the scheduler has been closed, so worker loops can check for
    /// shutdown between polls.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<Uuid>, SchedulerError>;

    /// Wake all blocked dequeuers with `None` and reject further enqueues.
    async fn close(&self);
}
