//! Exponential-backoff retry helper.
//!
//! Used for storage and scheduler construction at startup; dependency
//! containers often come up seconds after the agent process.

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `operation` until it succeeds or the configured attempts are
/// exhausted, sleeping an exponentially growing interval between attempts.
/// Returns the last error on exhaustion.
pub async fn execute_with_retry<T, E, F, Fut>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut wait = config.min_wait;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts.max(1) {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < config.max_attempts {
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation_name, attempt, config.max_attempts, err, wait
                    );
                    tokio::time::sleep(wait).await;
                    wait = (wait * 2).min(config.max_wait);
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error.expect("at least one attempt was made"))
}

/// Backoff interval for the given zero-based attempt, capped at `max`.
pub fn backoff_interval(min: Duration, max: Duration, attempt: u32) -> Duration {
    min.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let config = RetryConfig::default();
        let result: Result<i32, String> =
            execute_with_retry("op", &config, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let config = RetryConfig {
            max_attempts: 5,
            min_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(4),
        };
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = execute_with_retry("op", &config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet".to_string())
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let config = RetryConfig {
            max_attempts: 3,
            min_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = execute_with_retry("op", &config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("boom {}", n)) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "boom 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_interval_caps() {
        let min = Duration::from_millis(100);
        let max = Duration::from_secs(2);
        assert_eq!(backoff_interval(min, max, 0), Duration::from_millis(100));
        assert_eq!(backoff_interval(min, max, 2), Duration::from_millis(400));
        assert_eq!(backoff_interval(min, max, 20), max);
    }
}
