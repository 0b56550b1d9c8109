//! Feedback — post-hoc records attached to a task.
//!
//! Feedback is the one mutation allowed on terminal tasks; it lives beside
//! the task, not on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A feedback record keyed by task id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Free-form payload (rating, comments, ...), persisted verbatim.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(task_id: Uuid, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            payload,
            created_at: Utc::now(),
        }
    }
}
