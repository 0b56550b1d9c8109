//! Push notification (webhook) dispatcher.
//!
//! When a task reaches a terminal state the dispatcher POSTs the task
//! snapshot to the task's registered webhook, falling back to the
//! deployment-wide webhook. Delivery is fire-and-forget on a spawned task so
//! it never blocks a worker: 5xx and network errors are retried within
//! bounds, any 4xx is a permanent failure and only logged.

use crate::config::PushConfig;
use crate::retry::backoff_interval;
use bindu_a2a_protocol::{PushNotificationConfig, Task};
use bindu_storage::{BoxedStorage, Storage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Dispatches terminal-state notifications to registered webhooks.
#[derive(Clone)]
pub struct PushDispatcher {
    client: reqwest::Client,
    config: PushConfig,
    storage: Arc<BoxedStorage>,
}

impl PushDispatcher {
    pub fn new(config: PushConfig, storage: Arc<BoxedStorage>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            config,
            storage,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Resolve the webhook for this task and deliver the snapshot in the
    /// background. Returns immediately.
    pub fn notify_terminal(&self, task: &Task) {
        if !self.config.enabled {
            return;
        }
        let dispatcher = self.clone();
        let task = task.clone();
        tokio::spawn(async move {
            let webhook = match dispatcher.storage.load_webhook(task.id).await {
                Ok(Some(config)) => Some(config),
                Ok(None) => dispatcher.config.global_webhook.clone(),
                Err(err) => {
                    warn!("Webhook lookup failed for task {}: {}", task.id, err);
                    dispatcher.config.global_webhook.clone()
                }
            };
            if let Some(webhook) = webhook {
                dispatcher.deliver(&task, &webhook).await;
            }
        });
    }

    async fn deliver(&self, task: &Task, webhook: &PushNotificationConfig) {
        let payload = match serde_json::to_value(task) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Task {} snapshot failed to serialize: {}", task.id, err);
                return;
            }
        };

        for attempt in 0..self.config.max_attempts {
            let mut request = self.client.post(&webhook.url).json(&payload);
            if let Some(ref token) = webhook.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        "Delivered push notification for task {} ({})",
                        task.id, task.state
                    );
                    return;
                }
                Ok(response) if response.status().is_client_error() => {
                    warn!(
                        "Webhook {} rejected task {} notification with {}; giving up",
                        webhook.url,
                        task.id,
                        response.status()
                    );
                    return;
                }
                Ok(response) => {
                    warn!(
                        "Webhook {} returned {} for task {} (attempt {}/{})",
                        webhook.url,
                        response.status(),
                        task.id,
                        attempt + 1,
                        self.config.max_attempts
                    );
                }
                Err(err) => {
                    warn!(
                        "Webhook {} delivery failed for task {} (attempt {}/{}): {}",
                        webhook.url,
                        task.id,
                        attempt + 1,
                        self.config.max_attempts,
                        err
                    );
                }
            }

            tokio::time::sleep(backoff_interval(
                self.config.retry_min_wait,
                Duration::from_secs(30),
                attempt,
            ))
            .await;
        }
        warn!(
            "Exhausted webhook delivery attempts for task {} to {}",
            task.id, webhook.url
        );
    }
}
