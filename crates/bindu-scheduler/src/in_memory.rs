//! In-memory scheduler backend.
//!
//! A single bounded tokio channel. Used for tests and single-process
//! deployments; the bound makes enqueue block when workers lag, so
//! backpressure reaches the HTTP layer naturally.

use crate::error::SchedulerError;
use crate::traits::Scheduler;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Configuration for the in-memory scheduler.
#[derive(Debug, Clone)]
pub struct InMemorySchedulerConfig {
    /// Queue capacity; enqueue blocks when full.
    pub capacity: usize,
}

impl Default for InMemorySchedulerConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// In-memory scheduler backend.
///
/// The receiver sits behind a mutex so many workers can share one queue;
/// each id is delivered to exactly one dequeuer.
#[derive(Clone)]
pub struct InMemoryScheduler {
    sender: mpsc::Sender<Uuid>,
    receiver: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    shutdown: CancellationToken,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::with_config(InMemorySchedulerConfig::default())
    }

    pub fn with_config(config: InMemorySchedulerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            shutdown: CancellationToken::new(),
        }
    }
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn enqueue(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::Closed);
        }
        self.sender
            .send(task_id)
            .await
            .map_err(|_| SchedulerError::Closed)
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Uuid>, SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Ok(None);
        }

        // Hold the receiver lock only for this poll; the timeout bounds the
        // wait so a slow consumer cannot starve its peers indefinitely.
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            received = receiver.recv() => Ok(received),
            _ = tokio::time::sleep(timeout) => Ok(None),
            _ = self.shutdown.cancelled() => Ok(None),
        }
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}
