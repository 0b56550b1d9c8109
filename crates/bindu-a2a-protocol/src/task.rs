//! Task — the stateful unit of work in the A2A protocol.
//!
//! A task is one conversation turn and its lifecycle:
//!
//! ```text
//! submitted -> working | canceled | failed | rejected
//! working -> input-required | auth-required | completed | failed | canceled
//! input-required -> working | canceled | failed
//! auth-required -> working | canceled | failed
//! completed/failed/canceled/rejected -> (terminal, immutable)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::message::Message;

/// The state of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Submitted, awaiting worker pickup.
    Submitted,
    /// Agent actively processing.
    Working,
    /// Paused, waiting for additional input from the client.
    InputRequired,
    /// Paused, waiting for authentication or authorization.
    AuthRequired,
    /// Finished successfully (terminal).
    Completed,
    /// Failed due to an error (terminal).
    Failed,
    /// Canceled by the client (terminal).
    Canceled,
    /// Rejected by the agent (terminal).
    Rejected,
}

impl TaskState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }

    /// The wire representation (kebab-case, e.g. `input-required`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::AuthRequired => "auth-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
            TaskState::Rejected => "rejected",
        }
    }

    /// Parse the wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(TaskState::Submitted),
            "working" => Some(TaskState::Working),
            "input-required" => Some(TaskState::InputRequired),
            "auth-required" => Some(TaskState::AuthRequired),
            "completed" => Some(TaskState::Completed),
            "failed" => Some(TaskState::Failed),
            "canceled" => Some(TaskState::Canceled),
            "rejected" => Some(TaskState::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational discriminant carried by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Task,
    Team,
    Workflow,
}

/// A task and its accumulated conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v7 so listings order temporally).
    pub id: Uuid,
    /// Context this task belongs to.
    pub context_id: Uuid,
    /// Discriminant tag; informational only.
    #[serde(default)]
    pub kind: TaskKind,
    /// Current lifecycle state.
    pub state: TaskState,
    /// When `state` last changed.
    pub state_timestamp: DateTime<Utc>,
    /// Ordered conversation history.
    #[serde(default)]
    pub history: Vec<Message>,
    /// Ordered structured outputs produced by the agent.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Free-form metadata. Keys starting with `_` are reserved by the runtime.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh task in `submitted` with a single-message history.
    pub fn submitted(context_id: Uuid, message: Message) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            context_id,
            kind: TaskKind::Task,
            state: TaskState::Submitted,
            state_timestamp: now,
            history: vec![message],
            artifacts: Vec::new(),
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Copy with `history` truncated to the last `n` messages.
    pub fn with_history_limit(mut self, n: usize) -> Self {
        if self.history.len() > n {
            self.history.drain(..self.history.len() - n);
        }
        self
    }

    /// Listing view: the task without its history or artifacts bodies.
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "context_id": self.context_id,
            "kind": self.kind,
            "state": self.state,
            "state_timestamp": self.state_timestamp,
            "metadata": self.metadata,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}
