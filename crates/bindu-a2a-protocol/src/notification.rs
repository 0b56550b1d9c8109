//! Push notification (webhook) configuration.

use serde::{Deserialize, Serialize};

/// Where to POST the task snapshot when a task reaches a terminal state.
///
/// Registered per task via `tasks/pushNotification/set`, or deployment-wide
/// through the server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotificationConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl PushNotificationConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
