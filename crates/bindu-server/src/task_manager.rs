//! Task Manager — the A2A JSON-RPC method surface.
//!
//! Translates each protocol method into storage and scheduler operations,
//! enforces protocol invariants, and shapes responses. Client input errors
//! short-circuit with the appropriate error kind and never reach the
//! scheduler; for `message/send` the enqueue is the last step before
//! responding OK.

use crate::push::PushDispatcher;
use crate::worker::CancellationRegistry;
use bindu_a2a_protocol::{A2aError, Message, PushNotificationConfig, Task, TaskState};
use bindu_json_rpc::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, RequestParams};
use bindu_scheduler::{BoxedScheduler, Scheduler};
use bindu_storage::{BoxedStorage, Storage, StorageError, TaskFilter, TaskUpdate};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The A2A protocol state machine front-end.
pub struct TaskManager {
    storage: Arc<BoxedStorage>,
    scheduler: Arc<BoxedScheduler>,
    push: PushDispatcher,
    cancellations: CancellationRegistry,
}

impl TaskManager {
    pub fn new(
        storage: Arc<BoxedStorage>,
        scheduler: Arc<BoxedScheduler>,
        push: PushDispatcher,
        cancellations: CancellationRegistry,
    ) -> Self {
        Self {
            storage,
            scheduler,
            push,
            cancellations,
        }
    }

    /// Dispatch one JSON-RPC request to its method handler and wrap the
    /// outcome in a response envelope.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id.clone();
        let method = request.method.clone();
        let params = request.params.unwrap_or_default();

        debug!("A2A request: method={}", method);

        let result = match method.as_str() {
            "message/send" => self.send_message(params).await,
            "tasks/get" => self.get_task(params).await,
            "tasks/cancel" => self.cancel_task(params).await,
            "tasks/list" => self.list_tasks(params).await,
            "tasks/feedback" => self.task_feedback(params).await,
            "contexts/list" => self.list_contexts(params).await,
            "contexts/clear" => self.clear_context(params).await,
            "tasks/pushNotification/set" => self.set_push_notification(params).await,
            other => Err(A2aError::MethodNotFound(other.to_string())),
        };

        match result {
            Ok(value) => JsonRpcMessage::success(id, value),
            Err(err) => {
                warn!("A2A method {} failed: {}", method, err);
                JsonRpcError::new(Some(id), (&err).into()).into()
            }
        }
    }

    // === message/send ===

    async fn send_message(&self, params: RequestParams) -> Result<Value, A2aError> {
        let mut message_value = params
            .get("message")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| A2aError::InvalidParams("missing 'message' object".into()))?;

        // Resolve ids before deserializing: a malformed context_id must mint
        // a fresh one, never fail the request (DoS hardening).
        let context_id = parse_context_id(
            params
                .get_str("context_id")
                .or_else(|| message_value.get("context_id").and_then(Value::as_str)),
        );
        let requested_task = params
            .get_str("task_id")
            .or_else(|| message_value.get("task_id").and_then(Value::as_str))
            .and_then(|raw| Uuid::parse_str(raw).ok());

        if !message_value.contains_key("message_id") {
            message_value.insert("message_id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        message_value.insert("context_id".into(), Value::String(context_id.to_string()));
        message_value.remove("task_id");

        let message: Message = serde_json::from_value(Value::Object(message_value))
            .map_err(|e| A2aError::InvalidParams(format!("malformed message: {}", e)))?;

        // Explicit task_id on a non-terminal task resumes it
        if let Some(task_id) = requested_task {
            if let Some(task) = self
                .storage
                .load_task(task_id, None)
                .await
                .map_err(internal)?
            {
                if !task.is_terminal() {
                    return self.resume_task(task, message).await;
                }
            }
        }

        // Without a task_id, a paused task on the same context resumes when
        // the client replies
        if let Some(paused) = self.find_paused_task(context_id).await? {
            return self.resume_task(paused, message).await;
        }

        let task = self
            .storage
            .submit_task(context_id, message)
            .await
            .map_err(map_storage_error)?;

        self.scheduler
            .enqueue(task.id)
            .await
            .map_err(|e| A2aError::Internal(format!("enqueue failed: {}", e)))?;

        Ok(serde_json::to_value(&task).map_err(internal)?)
    }

    async fn find_paused_task(&self, context_id: Uuid) -> Result<Option<Task>, A2aError> {
        let tasks = self
            .storage
            .list_tasks(TaskFilter {
                context_id: Some(context_id),
                ..Default::default()
            })
            .await
            .map_err(internal)?;
        Ok(tasks.into_iter().find(|t| {
            matches!(t.state, TaskState::InputRequired | TaskState::AuthRequired)
        }))
    }

    /// Append the message; paused tasks transition back to `submitted` and
    /// re-enter the queue. Already-queued or working tasks only accumulate
    /// the message (the queue entry or active worker is still live).
    async fn resume_task(&self, task: Task, message: Message) -> Result<Value, A2aError> {
        let resuming = matches!(
            task.state,
            TaskState::InputRequired | TaskState::AuthRequired
        );

        let mut update = TaskUpdate::append(vec![message]);
        if resuming {
            update = update.with_state(TaskState::Submitted);
        }

        let updated = self
            .storage
            .update_task(task.id, update)
            .await
            .map_err(map_storage_error)?;

        if resuming {
            self.scheduler
                .enqueue(updated.id)
                .await
                .map_err(|e| A2aError::Internal(format!("enqueue failed: {}", e)))?;
        }

        Ok(serde_json::to_value(&updated).map_err(internal)?)
    }

    // === tasks/get ===

    async fn get_task(&self, params: RequestParams) -> Result<Value, A2aError> {
        let task_id = required_uuid(&params, "task_id")?;
        let history_length = params.get_u64("history_length").map(|n| n as usize);

        let task = self
            .storage
            .load_task(task_id, history_length)
            .await
            .map_err(internal)?
            .ok_or(A2aError::TaskNotFound(task_id))?;

        Ok(serde_json::to_value(&task).map_err(internal)?)
    }

    // === tasks/cancel ===

    async fn cancel_task(&self, params: RequestParams) -> Result<Value, A2aError> {
        let task_id = required_uuid(&params, "task_id")?;

        let task = self
            .storage
            .load_task(task_id, None)
            .await
            .map_err(internal)?
            .ok_or(A2aError::TaskNotFound(task_id))?;

        if task.is_terminal() {
            return Err(A2aError::InvalidStateTransition(format!(
                "task {} is already {}",
                task_id, task.state
            )));
        }

        // The state is canceled in storage before this returns; any in-flight
        // worker observes the signal at its next cooperative yield
        let canceled = self
            .storage
            .update_task(task_id, TaskUpdate::transition(TaskState::Canceled))
            .await
            .map_err(map_storage_error)?;
        self.cancellations.cancel(task_id);
        self.push.notify_terminal(&canceled);

        Ok(serde_json::to_value(&canceled).map_err(internal)?)
    }

    // === tasks/list ===

    async fn list_tasks(&self, params: RequestParams) -> Result<Value, A2aError> {
        let state = match params.get_str("state") {
            Some(raw) => Some(
                TaskState::parse(raw)
                    .ok_or_else(|| A2aError::InvalidParams(format!("unknown state '{}'", raw)))?,
            ),
            None => None,
        };
        let context_id = match params.get_str("context_id") {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| A2aError::InvalidParams("malformed context_id".into()))?,
            ),
            None => None,
        };

        let tasks = self
            .storage
            .list_tasks(TaskFilter {
                state,
                context_id,
                limit: params.get_u64("limit").map(|n| n as usize),
                offset: params.get_u64("offset").map(|n| n as usize),
            })
            .await
            .map_err(internal)?;

        // Listing carries metadata only, no history bodies
        Ok(Value::Array(tasks.iter().map(Task::summary).collect()))
    }

    // === tasks/feedback ===

    async fn task_feedback(&self, params: RequestParams) -> Result<Value, A2aError> {
        let task_id = required_uuid(&params, "task_id")?;

        let mut payload = params.into_map();
        payload.remove("task_id");

        let feedback = self
            .storage
            .save_feedback(task_id, Value::Object(payload))
            .await
            .map_err(map_storage_error)?;

        Ok(serde_json::to_value(&feedback).map_err(internal)?)
    }

    // === contexts/list ===

    async fn list_contexts(&self, _params: RequestParams) -> Result<Value, A2aError> {
        let contexts = self.storage.list_contexts().await.map_err(internal)?;
        Ok(serde_json::to_value(&contexts).map_err(internal)?)
    }

    // === contexts/clear ===

    async fn clear_context(&self, params: RequestParams) -> Result<Value, A2aError> {
        let context_id = required_uuid(&params, "context_id")?;

        self.storage
            .clear_context(context_id)
            .await
            .map_err(map_storage_error)?;

        Ok(serde_json::json!({
            "context_id": context_id,
            "cleared": true,
        }))
    }

    // === tasks/pushNotification/set ===

    async fn set_push_notification(&self, params: RequestParams) -> Result<Value, A2aError> {
        if !self.push.is_enabled() {
            return Err(A2aError::PushNotSupported);
        }

        // `id` accepted as an alias for task_id
        let task_id = params
            .get_str("task_id")
            .or_else(|| params.get_str("id"))
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| A2aError::InvalidParams("missing or malformed task_id".into()))?;

        let config_value = params
            .get("push_notification_config")
            .cloned()
            .ok_or_else(|| A2aError::InvalidParams("missing push_notification_config".into()))?;
        let config: PushNotificationConfig = serde_json::from_value(config_value)
            .map_err(|e| A2aError::InvalidParams(format!("malformed config: {}", e)))?;

        if self
            .storage
            .load_task(task_id, Some(0))
            .await
            .map_err(internal)?
            .is_none()
        {
            return Err(A2aError::TaskNotFound(task_id));
        }

        self.storage
            .save_webhook(task_id, config.clone())
            .await
            .map_err(internal)?;

        Ok(serde_json::json!({
            "task_id": task_id,
            "push_notification_config": config,
        }))
    }
}

/// Parse a context id, minting a fresh UUID on absent or malformed input.
/// Malformed input must never error: garbage strings from clients would
/// otherwise be a trivial DoS vector.
fn parse_context_id(raw: Option<&str>) -> Uuid {
    raw.and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn required_uuid(params: &RequestParams, key: &str) -> Result<Uuid, A2aError> {
    let raw = params
        .get_str(key)
        .ok_or_else(|| A2aError::InvalidParams(format!("missing '{}'", key)))?;
    Uuid::parse_str(raw).map_err(|_| A2aError::InvalidParams(format!("malformed '{}'", key)))
}

fn map_storage_error(err: StorageError) -> A2aError {
    match err {
        StorageError::TaskNotFound(id) => A2aError::TaskNotFound(id),
        StorageError::ContextNotFound(id) => A2aError::ContextNotFound(id),
        StorageError::InvalidTransition { current, requested } => A2aError::InvalidStateTransition(
            format!("{} -> {} is not allowed", current, requested),
        ),
        StorageError::TerminalState(state) => {
            A2aError::InvalidStateTransition(format!("task is already {}", state))
        }
        other => A2aError::Internal(other.to_string()),
    }
}

fn internal(err: impl std::fmt::Display) -> A2aError {
    A2aError::Internal(err.to_string())
}
