//! Context — a grouping of related tasks sharing conversational memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::message::Message;

/// A context. Created implicitly on first task submission, destroyed only by
/// an explicit `contexts/clear` (which cascade-deletes its tasks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub context_id: Uuid,
    /// Accumulated session data.
    #[serde(default)]
    pub context_data: Map<String, Value>,
    /// Cross-task message list; populated only when the deployment enables
    /// context-based history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_history: Option<Vec<Message>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Context {
    pub fn new(context_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            context_id,
            context_data: Map::new(),
            message_history: None,
            created_at: now,
            updated_at: now,
        }
    }
}
