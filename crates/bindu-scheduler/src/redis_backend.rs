//! Redis scheduler backend.
//!
//! One Redis list per deployment holds pending task ids as strings. Enqueue
//! is RPUSH, dequeue is BLPOP with the configured poll timeout, so many
//! worker processes can share one queue with each id delivered to exactly
//! one of them. Transient connection failures are retried with exponential
//! backoff on both sides.

use crate::error::SchedulerError;
use crate::traits::Scheduler;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the Redis scheduler backend.
#[derive(Debug, Clone)]
pub struct RedisSchedulerConfig {
    /// Redis connection URL (e.g. "redis://localhost:6379")
    pub url: String,
    /// List key holding pending task ids.
    pub queue_key: String,
    /// Attempts per operation before giving up.
    pub max_attempts: u32,
    /// Initial backoff between attempts.
    pub min_wait: Duration,
    /// Backoff ceiling.
    pub max_wait: Duration,
}

impl Default for RedisSchedulerConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            queue_key: "bindu:task_queue".to_string(),
            max_attempts: 3,
            min_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(5),
        }
    }
}

/// Redis-backed scheduler.
///
/// The connection manager multiplexes one connection and reconnects on
/// failure; it is cheap to clone per operation.
pub struct RedisScheduler {
    manager: ConnectionManager,
    config: RedisSchedulerConfig,
    shutdown: CancellationToken,
}

impl RedisScheduler {
    /// Connect to Redis. Fails if the server is unreachable; callers retry
    /// construction through their startup policy.
    pub async fn connect(config: RedisSchedulerConfig) -> Result<Self, SchedulerError> {
        info!("Initializing Redis scheduler at {}", config.url);
        let client = redis::Client::open(config.url.as_str())?;
        let manager = client.get_connection_manager().await?;
        info!("Redis scheduler ready (queue '{}')", config.queue_key);
        Ok(Self {
            manager,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let wait = self.config.min_wait.saturating_mul(2u32.saturating_pow(attempt));
        wait.min(self.config.max_wait)
    }
}

#[async_trait]
impl Scheduler for RedisScheduler {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn enqueue(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::Closed);
        }

        let mut last_error = None;
        for attempt in 0..self.config.max_attempts {
            let mut conn = self.manager.clone();
            match conn
                .rpush::<_, _, ()>(&self.config.queue_key, task_id.to_string())
                .await
            {
                Ok(()) => {
                    debug!("Enqueued task {}", task_id);
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        "Redis enqueue attempt {}/{} failed: {}",
                        attempt + 1,
                        self.config.max_attempts,
                        err
                    );
                    last_error = Some(err);
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }
        Err(last_error.map(SchedulerError::from).unwrap_or(SchedulerError::Closed))
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Uuid>, SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Ok(None);
        }

        let mut last_error = None;
        for attempt in 0..self.config.max_attempts {
            let mut conn = self.manager.clone();
            let blpop = conn.blpop::<_, Option<(String, String)>>(
                &self.config.queue_key,
                timeout.as_secs_f64(),
            );

            let popped = tokio::select! {
                result = blpop => result,
                _ = self.shutdown.cancelled() => return Ok(None),
            };

            match popped {
                Ok(Some((_key, raw))) => {
                    let task_id = Uuid::parse_str(&raw)
                        .map_err(|_| SchedulerError::MalformedTaskId(raw))?;
                    return Ok(Some(task_id));
                }
                Ok(None) => return Ok(None), // poll timeout
                Err(err) => {
                    warn!(
                        "Redis dequeue attempt {}/{} failed: {}",
                        attempt + 1,
                        self.config.max_attempts,
                        err
                    );
                    last_error = Some(err);
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }
        Err(last_error.map(SchedulerError::from).unwrap_or(SchedulerError::Closed))
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_redis_url() -> Option<String> {
        std::env::var("REDIS_URL").ok()
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RedisSchedulerConfig {
            min_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(1),
            ..Default::default()
        };
        // Construct without connecting just to exercise the arithmetic
        let backoff = |attempt: u32| {
            config
                .min_wait
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(config.max_wait)
        };
        assert_eq!(backoff(0), Duration::from_millis(100));
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(10), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn round_trip_against_live_redis() {
        let Some(url) = test_redis_url() else {
            eprintln!("REDIS_URL not set; skipping redis scheduler test");
            return;
        };

        let scheduler = RedisScheduler::connect(RedisSchedulerConfig {
            url,
            queue_key: format!("bindu:test:{}", Uuid::new_v4()),
            ..Default::default()
        })
        .await
        .expect("connect");

        let task_id = Uuid::new_v4();
        scheduler.enqueue(task_id).await.unwrap();
        let popped = scheduler.dequeue(Duration::from_secs(1)).await.unwrap();
        assert_eq!(popped, Some(task_id));

        // Empty queue times out with None
        let empty = scheduler.dequeue(Duration::from_millis(100)).await.unwrap();
        assert_eq!(empty, None);
    }
}
