//! Runtime configuration.
//!
//! Everything defaults to a zero-config single-process deployment (in-memory
//! storage and scheduler on localhost). Environment variables override the
//! well-known keys; programmatic configuration through the builder wins over
//! both.

use std::net::SocketAddr;
use std::time::Duration;

use bindu_a2a_protocol::PushNotificationConfig;

/// Storage backend selection.
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    /// In-process dictionaries; state dies with the process.
    #[default]
    Memory,
    /// PostgreSQL with per-DID schema isolation.
    #[cfg(feature = "postgres")]
    Postgres {
        database_url: String,
        max_connections: u32,
        min_connections: u32,
    },
}

/// Scheduler backend selection.
#[derive(Debug, Clone, Default)]
pub enum SchedulerConfig {
    /// Bounded in-process channel.
    #[default]
    Memory,
    /// Shared Redis list; lets many worker processes drain one queue.
    #[cfg(feature = "redis")]
    Redis { url: String, queue_key: String },
}

/// Worker pool tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    pub workers: usize,
    /// Dequeue poll timeout; bounds shutdown latency.
    pub poll_timeout: Duration,
    /// Handler attempts per task (first try + retries) on transient errors.
    pub max_attempts: u32,
    /// Initial backoff between handler attempts.
    pub retry_min_wait: Duration,
    /// Backoff ceiling.
    pub retry_max_wait: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_timeout: Duration::from_millis(500),
            max_attempts: 3,
            retry_min_wait: Duration::from_millis(200),
            retry_max_wait: Duration::from_secs(5),
        }
    }
}

/// Startup retry policy for storage/scheduler construction, tolerating
/// dependency warm-up (e.g. Postgres in a sibling container).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_wait: Duration::from_millis(500),
            max_wait: Duration::from_secs(10),
        }
    }
}

/// Authentication gate on the A2A endpoint.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Provider label reported in logs (the verifier itself is supplied to
    /// the builder).
    pub provider: String,
}

/// Push notification (webhook) settings.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub enabled: bool,
    /// Deployment-wide webhook applied when a task has no config of its own.
    pub global_webhook: Option<PushNotificationConfig>,
    /// Delivery attempts on 5xx/network errors.
    pub max_attempts: u32,
    pub retry_min_wait: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_webhook: None,
            max_attempts: 3,
            retry_min_wait: Duration::from_millis(500),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub retry: RetryConfig,
    pub auth: AuthConfig,
    pub push: PushConfig,
    /// Accumulate cross-task message history on contexts.
    pub context_history: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3773".parse().expect("valid default address"),
            max_body_size: 1024 * 1024, // 1MB
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            worker: WorkerConfig::default(),
            retry: RetryConfig::default(),
            auth: AuthConfig::default(),
            push: PushConfig::default(),
            context_history: false,
        }
    }
}

impl ServerConfig {
    /// Apply environment-variable overrides on the well-known keys.
    ///
    /// Recognized: `BINDU_HOST`, `BINDU_PORT`, `BINDU_WORKERS`,
    /// `BINDU_STORAGE_BACKEND` (+ `BINDU_POSTGRES_URL`),
    /// `BINDU_SCHEDULER_BACKEND` (+ `BINDU_REDIS_URL`),
    /// `BINDU_AUTH_ENABLED`, `BINDU_GLOBAL_WEBHOOK_URL`,
    /// `BINDU_GLOBAL_WEBHOOK_TOKEN`.
    pub fn apply_env_overrides(mut self) -> Self {
        if let (Ok(host), port) = (
            std::env::var("BINDU_HOST"),
            std::env::var("BINDU_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok()),
        ) {
            let port = port.unwrap_or_else(|| self.bind_address.port());
            if let Ok(addr) = format!("{}:{}", host, port).parse() {
                self.bind_address = addr;
            }
        } else if let Some(port) = std::env::var("BINDU_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
        {
            self.bind_address.set_port(port);
        }

        if let Some(workers) = std::env::var("BINDU_WORKERS")
            .ok()
            .and_then(|w| w.parse::<usize>().ok())
        {
            if workers > 0 {
                self.worker.workers = workers;
            }
        }

        #[cfg(feature = "postgres")]
        if std::env::var("BINDU_STORAGE_BACKEND").as_deref() == Ok("postgres") {
            if let Ok(database_url) = std::env::var("BINDU_POSTGRES_URL") {
                self.storage = StorageConfig::Postgres {
                    database_url,
                    max_connections: 20,
                    min_connections: 2,
                };
            }
        }

        #[cfg(feature = "redis")]
        if std::env::var("BINDU_SCHEDULER_BACKEND").as_deref() == Ok("redis") {
            if let Ok(url) = std::env::var("BINDU_REDIS_URL") {
                self.scheduler = SchedulerConfig::Redis {
                    url,
                    queue_key: "bindu:task_queue".to_string(),
                };
            }
        }

        if let Ok(enabled) = std::env::var("BINDU_AUTH_ENABLED") {
            self.auth.enabled = matches!(enabled.as_str(), "1" | "true" | "yes");
        }

        if let Ok(url) = std::env::var("BINDU_GLOBAL_WEBHOOK_URL") {
            let mut webhook = PushNotificationConfig::new(url);
            if let Ok(token) = std::env::var("BINDU_GLOBAL_WEBHOOK_TOKEN") {
                webhook = webhook.with_token(token);
            }
            self.push.global_webhook = Some(webhook);
        }

        self
    }
}
