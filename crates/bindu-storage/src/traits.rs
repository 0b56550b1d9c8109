//! Core storage trait and mutation types.
//!
//! Defines the [`Storage`] trait and the [`TaskUpdate`] append/merge mutation
//! for persisting A2A tasks across backends (InMemory, Postgres).

use crate::error::StorageError;
use async_trait::async_trait;
use bindu_a2a_protocol::{
    Artifact, Context, Feedback, Message, PushNotificationConfig, Task, TaskState,
};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An atomic mutation of one task.
///
/// `new_messages` and `new_artifacts` are appended, `metadata` is merged
/// key-by-key — existing data is never replaced wholesale. `state` triggers
/// state machine validation and rewrites `state_timestamp`.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub state: Option<TaskState>,
    pub new_messages: Vec<Message>,
    pub new_artifacts: Vec<Artifact>,
    pub metadata: Option<Map<String, Value>>,
}

impl TaskUpdate {
    /// A pure state transition.
    pub fn transition(state: TaskState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Append messages without changing state.
    pub fn append(messages: Vec<Message>) -> Self {
        Self {
            new_messages: messages,
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.new_messages.push(message);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.new_artifacts.push(artifact);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True when the update would not touch the task at all.
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.new_messages.is_empty()
            && self.new_artifacts.is_empty()
            && self.metadata.as_ref().is_none_or(|m| m.is_empty())
    }
}

/// Filter for task listing. Results order most-recent-first by `updated_at`.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub state: Option<TaskState>,
    pub context_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Core trait for storage backends.
///
/// Every successful `update_task` is linearizable against concurrent
/// readers: a reader sees the pre-state or the post-state, never a partial
/// merge. Implementations must be `Send + Sync`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Human-readable name of the backend (e.g. "in-memory", "postgres").
    fn backend_name(&self) -> &'static str;

    // === Tasks ===

    /// Atomically ensure the context exists and allocate a task in
    /// `submitted` whose history is exactly the given message. The message's
    /// `task_id`/`context_id` back-references are overwritten with the
    /// resolved ids.
    async fn submit_task(&self, context_id: Uuid, message: Message) -> Result<Task, StorageError>;

    /// Apply an atomic update. Fails with `TaskNotFound` if the task is gone,
    /// `TerminalState`/`InvalidTransition` if the mutation would touch a
    /// terminal task or violate the lifecycle.
    async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> Result<Task, StorageError>;

    /// Read a task; `history_length` truncates history to the last N entries.
    async fn load_task(
        &self,
        task_id: Uuid,
        history_length: Option<usize>,
    ) -> Result<Option<Task>, StorageError>;

    /// Filtered listing, most-recent-first by `updated_at`.
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StorageError>;

    /// Count tasks, optionally restricted to one state.
    async fn count_tasks(&self, state: Option<TaskState>) -> Result<u64, StorageError>;

    // === Contexts ===

    async fn get_context(&self, context_id: Uuid) -> Result<Option<Context>, StorageError>;

    async fn list_contexts(&self) -> Result<Vec<Context>, StorageError>;

    /// Delete the context and cascade-delete its tasks and their feedback.
    async fn clear_context(&self, context_id: Uuid) -> Result<(), StorageError>;

    // === Feedback ===

    /// Append a feedback record. Allowed on any task state including
    /// terminal.
    async fn save_feedback(&self, task_id: Uuid, payload: Value) -> Result<Feedback, StorageError>;

    async fn get_feedback(&self, task_id: Uuid) -> Result<Vec<Feedback>, StorageError>;

    // === Webhooks ===

    async fn save_webhook(
        &self,
        task_id: Uuid,
        config: PushNotificationConfig,
    ) -> Result<(), StorageError>;

    async fn load_webhook(
        &self,
        task_id: Uuid,
    ) -> Result<Option<PushNotificationConfig>, StorageError>;

    /// Returns `true` if a config was removed.
    async fn delete_webhook(&self, task_id: Uuid) -> Result<bool, StorageError>;

    // === Lifecycle ===

    /// Release backend resources (pools, connections).
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
