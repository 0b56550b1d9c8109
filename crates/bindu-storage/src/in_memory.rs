//! In-memory storage backend.
//!
//! The reference implementation for storage semantics. Suitable for
//! development, testing and single-process deployments. All tables live in
//! one struct behind a single `RwLock`, so every operation is trivially
//! atomic.

use crate::error::StorageError;
use crate::state_machine;
use crate::traits::{Storage, TaskFilter, TaskUpdate};
use async_trait::async_trait;
use bindu_a2a_protocol::{
    Context, Feedback, Message, PushNotificationConfig, Task, TaskState,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Configuration for the in-memory storage backend.
#[derive(Debug, Clone)]
pub struct InMemoryStorageConfig {
    /// Default page size for list operations when the filter has no limit.
    pub default_list_limit: usize,
    /// Accumulate a cross-task message history on each context.
    pub context_history: bool,
}

impl Default for InMemoryStorageConfig {
    fn default() -> Self {
        Self {
            default_list_limit: 100,
            context_history: false,
        }
    }
}

#[derive(Default)]
struct Tables {
    tasks: HashMap<Uuid, Task>,
    contexts: HashMap<Uuid, Context>,
    feedback: HashMap<Uuid, Vec<Feedback>>,
    webhooks: HashMap<Uuid, PushNotificationConfig>,
}

/// In-memory storage backend.
#[derive(Clone)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
    config: InMemoryStorageConfig,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_config(InMemoryStorageConfig::default())
    }

    pub fn with_config(config: InMemoryStorageConfig) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            config,
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn submit_task(&self, context_id: Uuid, message: Message) -> Result<Task, StorageError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let context = tables
            .contexts
            .entry(context_id)
            .or_insert_with(|| Context::new(context_id));
        context.updated_at = now;

        let mut message = message;
        message.context_id = Some(context_id);
        let mut task = Task::submitted(context_id, message);
        task.history[0].task_id = Some(task.id);

        if self.config.context_history {
            context
                .message_history
                .get_or_insert_with(Vec::new)
                .push(task.history[0].clone());
        }

        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> Result<Task, StorageError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let task = tables
            .tasks
            .get_mut(&task_id)
            .ok_or(StorageError::TaskNotFound(task_id))?;

        // Validate before mutating so a failed update leaves no partial state
        if task.state.is_terminal() {
            return Err(StorageError::TerminalState(task.state));
        }
        if let Some(new_state) = update.state {
            state_machine::validate_transition(task.state, new_state)?;
        }

        let context_id = task.context_id;
        let mut appended = Vec::new();

        for mut message in update.new_messages {
            message.task_id = Some(task_id);
            message.context_id = Some(context_id);
            appended.push(message.clone());
            task.history.push(message);
        }
        task.artifacts.extend(update.new_artifacts);
        if let Some(metadata) = update.metadata {
            for (key, value) in metadata {
                task.metadata.insert(key, value);
            }
        }
        if let Some(new_state) = update.state {
            task.state = new_state;
            task.state_timestamp = now;
        }
        task.updated_at = now;
        let snapshot = task.clone();

        if self.config.context_history && !appended.is_empty() {
            if let Some(context) = tables.contexts.get_mut(&context_id) {
                context
                    .message_history
                    .get_or_insert_with(Vec::new)
                    .extend(appended);
                context.updated_at = now;
            }
        }

        Ok(snapshot)
    }

    async fn load_task(
        &self,
        task_id: Uuid,
        history_length: Option<usize>,
    ) -> Result<Option<Task>, StorageError> {
        let tables = self.tables.read().await;
        let task = tables.tasks.get(&task_id).cloned();
        Ok(match history_length {
            Some(n) => task.map(|t| t.with_history_limit(n)),
            None => task,
        })
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StorageError> {
        let tables = self.tables.read().await;

        let mut tasks: Vec<&Task> = tables
            .tasks
            .values()
            .filter(|t| filter.state.is_none_or(|s| t.state == s))
            .filter(|t| filter.context_id.is_none_or(|c| t.context_id == c))
            .collect();
        // Most-recent-first, task id as tiebreak for determinism
        tasks.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(self.config.default_list_limit);
        Ok(tasks.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn count_tasks(&self, state: Option<TaskState>) -> Result<u64, StorageError> {
        let tables = self.tables.read().await;
        let count = tables
            .tasks
            .values()
            .filter(|t| state.is_none_or(|s| t.state == s))
            .count();
        Ok(count as u64)
    }

    async fn get_context(&self, context_id: Uuid) -> Result<Option<Context>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.contexts.get(&context_id).cloned())
    }

    async fn list_contexts(&self) -> Result<Vec<Context>, StorageError> {
        let tables = self.tables.read().await;
        let mut contexts: Vec<Context> = tables.contexts.values().cloned().collect();
        contexts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(contexts)
    }

    async fn clear_context(&self, context_id: Uuid) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.contexts.remove(&context_id).is_none() {
            return Err(StorageError::ContextNotFound(context_id));
        }

        let task_ids: Vec<Uuid> = tables
            .tasks
            .values()
            .filter(|t| t.context_id == context_id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            tables.tasks.remove(&task_id);
            tables.feedback.remove(&task_id);
            tables.webhooks.remove(&task_id);
        }
        Ok(())
    }

    async fn save_feedback(
        &self,
        task_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<Feedback, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.contains_key(&task_id) {
            return Err(StorageError::TaskNotFound(task_id));
        }
        let feedback = Feedback::new(task_id, payload);
        tables
            .feedback
            .entry(task_id)
            .or_default()
            .push(feedback.clone());
        Ok(feedback)
    }

    async fn get_feedback(&self, task_id: Uuid) -> Result<Vec<Feedback>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.feedback.get(&task_id).cloned().unwrap_or_default())
    }

    async fn save_webhook(
        &self,
        task_id: Uuid,
        config: PushNotificationConfig,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        tables.webhooks.insert(task_id, config);
        Ok(())
    }

    async fn load_webhook(
        &self,
        task_id: Uuid,
    ) -> Result<Option<PushNotificationConfig>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.webhooks.get(&task_id).cloned())
    }

    async fn delete_webhook(&self, task_id: Uuid) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        Ok(tables.webhooks.remove(&task_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_submit_creates_context_and_task() {
        let storage = InMemoryStorage::new();
        let context_id = Uuid::new_v4();

        let task = storage
            .submit_task(context_id, Message::user_text("hello"))
            .await
            .unwrap();

        assert_eq!(task.state, TaskState::Submitted);
        assert_eq!(task.context_id, context_id);
        assert_eq!(task.history.len(), 1);
        assert_eq!(task.history[0].task_id, Some(task.id));
        assert_eq!(task.history[0].context_id, Some(context_id));

        let context = storage.get_context(context_id).await.unwrap();
        assert!(context.is_some());
    }

    #[tokio::test]
    async fn test_load_task_with_history_limit() {
        let storage = InMemoryStorage::new();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("m0"))
            .await
            .unwrap();
        let extra: Vec<Message> = (1..8).map(|i| Message::user_text(format!("m{}", i))).collect();
        storage
            .update_task(task.id, TaskUpdate::append(extra))
            .await
            .unwrap();

        let limited = storage.load_task(task.id, Some(3)).await.unwrap().unwrap();
        assert_eq!(limited.history.len(), 3);
        assert_eq!(limited.history[2].text_content(), "m7");

        let full = storage.load_task(task.id, None).await.unwrap().unwrap();
        assert_eq!(full.history.len(), 8);
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let storage = InMemoryStorage::new();
        let result = storage
            .update_task(Uuid::new_v4(), TaskUpdate::transition(TaskState::Working))
            .await;
        assert!(matches!(result, Err(StorageError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_task_is_immutable() {
        let storage = InMemoryStorage::new();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();
        storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Working))
            .await
            .unwrap();
        storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Completed))
            .await
            .unwrap();

        // Appends to a terminal task are rejected, not just transitions
        let result = storage
            .update_task(
                task.id,
                TaskUpdate::append(vec![Message::user_text("late")]),
            )
            .await;
        assert!(matches!(result, Err(StorageError::TerminalState(TaskState::Completed))));
    }

    #[tokio::test]
    async fn test_state_timestamp_tracks_state_changes_only() {
        let storage = InMemoryStorage::new();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();

        let working = storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Working))
            .await
            .unwrap();
        let after_append = storage
            .update_task(
                task.id,
                TaskUpdate::append(vec![Message::assistant_text("thinking")]),
            )
            .await
            .unwrap();

        assert_eq!(working.state_timestamp, after_append.state_timestamp);
        assert!(after_append.updated_at >= after_append.state_timestamp);
    }

    #[tokio::test]
    async fn test_metadata_merge() {
        let storage = InMemoryStorage::new();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();

        let mut first = serde_json::Map::new();
        first.insert("a".into(), json!(1));
        first.insert("b".into(), json!("x"));
        storage
            .update_task(task.id, TaskUpdate::default().with_metadata(first))
            .await
            .unwrap();

        let mut second = serde_json::Map::new();
        second.insert("b".into(), json!("y"));
        second.insert("c".into(), json!(true));
        let updated = storage
            .update_task(task.id, TaskUpdate::default().with_metadata(second))
            .await
            .unwrap();

        assert_eq!(updated.metadata["a"], json!(1));
        assert_eq!(updated.metadata["b"], json!("y"));
        assert_eq!(updated.metadata["c"], json!(true));
    }

    #[tokio::test]
    async fn test_list_tasks_ordering_and_filters() {
        let storage = InMemoryStorage::new();
        let context_a = Uuid::new_v4();
        let context_b = Uuid::new_v4();

        let t1 = storage
            .submit_task(context_a, Message::user_text("first"))
            .await
            .unwrap();
        let _t2 = storage
            .submit_task(context_b, Message::user_text("second"))
            .await
            .unwrap();
        let t3 = storage
            .submit_task(context_a, Message::user_text("third"))
            .await
            .unwrap();

        // Touch t1 so it becomes most recent
        storage
            .update_task(t1.id, TaskUpdate::transition(TaskState::Working))
            .await
            .unwrap();

        let all = storage.list_tasks(TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, t1.id);

        let in_a = storage
            .list_tasks(TaskFilter {
                context_id: Some(context_a),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_a.len(), 2);

        let working = storage
            .list_tasks(TaskFilter {
                state: Some(TaskState::Working),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(working.len(), 1);
        assert_eq!(working[0].id, t1.id);

        let paged = storage
            .list_tasks(TaskFilter {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, t3.id);
    }

    #[tokio::test]
    async fn test_count_tasks() {
        let storage = InMemoryStorage::new();
        let context = Uuid::new_v4();
        for _ in 0..3 {
            storage
                .submit_task(context, Message::user_text("x"))
                .await
                .unwrap();
        }
        assert_eq!(storage.count_tasks(None).await.unwrap(), 3);
        assert_eq!(
            storage.count_tasks(Some(TaskState::Submitted)).await.unwrap(),
            3
        );
        assert_eq!(
            storage.count_tasks(Some(TaskState::Working)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_clear_context_cascades() {
        let storage = InMemoryStorage::new();
        let context = Uuid::new_v4();
        let t1 = storage
            .submit_task(context, Message::user_text("a"))
            .await
            .unwrap();
        let t2 = storage
            .submit_task(context, Message::user_text("b"))
            .await
            .unwrap();
        storage.save_feedback(t1.id, json!({"rating": 5})).await.unwrap();
        storage
            .save_webhook(t2.id, PushNotificationConfig::new("https://example.com/h"))
            .await
            .unwrap();

        storage.clear_context(context).await.unwrap();

        assert!(storage.get_context(context).await.unwrap().is_none());
        assert!(storage.load_task(t1.id, None).await.unwrap().is_none());
        assert!(storage.load_task(t2.id, None).await.unwrap().is_none());
        assert!(storage.get_feedback(t1.id).await.unwrap().is_empty());
        assert!(storage.load_webhook(t2.id).await.unwrap().is_none());
        let remaining = storage
            .list_tasks(TaskFilter {
                context_id: Some(context),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_clear_missing_context() {
        let storage = InMemoryStorage::new();
        let result = storage.clear_context(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StorageError::ContextNotFound(_))));
    }

    #[tokio::test]
    async fn test_feedback_on_terminal_task() {
        let storage = InMemoryStorage::new();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();
        storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Working))
            .await
            .unwrap();
        storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Completed))
            .await
            .unwrap();

        storage
            .save_feedback(task.id, json!({"rating": 5, "feedback": "Great job!"}))
            .await
            .unwrap();
        let feedback = storage.get_feedback(task.id).await.unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].payload["rating"], 5);
    }

    #[tokio::test]
    async fn test_feedback_for_missing_task() {
        let storage = InMemoryStorage::new();
        let result = storage.save_feedback(Uuid::new_v4(), json!({})).await;
        assert!(matches!(result, Err(StorageError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_webhook_round_trip() {
        let storage = InMemoryStorage::new();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();

        let config = PushNotificationConfig::new("https://example.com/hook").with_token("tok");
        storage.save_webhook(task.id, config).await.unwrap();

        let loaded = storage.load_webhook(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.url, "https://example.com/hook");
        assert_eq!(loaded.token.as_deref(), Some("tok"));

        assert!(storage.delete_webhook(task.id).await.unwrap());
        assert!(!storage.delete_webhook(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_context_history_accumulates_when_enabled() {
        let storage = InMemoryStorage::with_config(InMemoryStorageConfig {
            context_history: true,
            ..Default::default()
        });
        let context = Uuid::new_v4();
        let task = storage
            .submit_task(context, Message::user_text("turn 1"))
            .await
            .unwrap();
        storage
            .update_task(
                task.id,
                TaskUpdate::transition(TaskState::Working)
                    .with_message(Message::assistant_text("reply 1")),
            )
            .await
            .unwrap();
        storage
            .submit_task(context, Message::user_text("turn 2"))
            .await
            .unwrap();

        let ctx = storage.get_context(context).await.unwrap().unwrap();
        let history = ctx.message_history.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends_serialize() {
        let storage = Arc::new(InMemoryStorage::new());
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("start"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let storage = Arc::clone(&storage);
            let task_id = task.id;
            handles.push(tokio::spawn(async move {
                storage
                    .update_task(
                        task_id,
                        TaskUpdate::append(vec![Message::user_text(format!("m{}", i))]),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let final_task = storage.load_task(task.id, None).await.unwrap().unwrap();
        // 1 initial + 16 appends, no interleaved partial writes
        assert_eq!(final_task.history.len(), 17);
    }

    // === Parity suite against the reference backend itself ===

    #[tokio::test]
    async fn parity_suite() {
        let storage = InMemoryStorage::new();
        crate::parity_tests::run_all(&storage).await;
    }
}
