//! Worker pool — drives tasks from the queue to a terminal state.
//!
//! A fixed pool of worker loops drains the scheduler. Each loop dequeues a
//! task id, claims the task by transitioning it to `working` (making handler
//! invocation at-most-once even though the queue is at-least-once), invokes
//! the user handler with the conversation history, classifies the return
//! value, and writes the outcome back in a single update. Handler output is
//! buffered, so a failed attempt persists nothing and retries cannot
//! duplicate appends.

use crate::config::WorkerConfig;
use crate::handler::{AgentHandler, HandlerError, HandlerTurn};
use crate::push::PushDispatcher;
use crate::retry::backoff_interval;
use bindu_a2a_protocol::{
    classify_handler_value, ControlState, HandlerOutcome, Message, Task, TaskState,
};
use bindu_scheduler::{BoxedScheduler, Scheduler};
use bindu_storage::{BoxedStorage, Storage, StorageError, TaskUpdate};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Per-task cancellation signals shared between the task manager (which sets
/// them on `tasks/cancel`) and the workers (which pass them to handlers).
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<std::sync::Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl CancellationRegistry {
    /// Create and track a token for an in-flight task.
    pub fn register(&self, task_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner
            .lock()
            .expect("cancellation registry lock")
            .insert(task_id, token.clone());
        token
    }

    pub fn remove(&self, task_id: Uuid) {
        self.inner
            .lock()
            .expect("cancellation registry lock")
            .remove(&task_id);
    }

    /// Signal the in-flight worker for this task, if any. Returns `true`
    /// when a live token was cancelled.
    pub fn cancel(&self, task_id: Uuid) -> bool {
        let guard = self.inner.lock().expect("cancellation registry lock");
        match guard.get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// The bounded pool of worker loops.
pub struct WorkerPool {
    storage: Arc<BoxedStorage>,
    scheduler: Arc<BoxedScheduler>,
    handler: Arc<dyn AgentHandler>,
    push: PushDispatcher,
    cancellations: CancellationRegistry,
    config: WorkerConfig,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        storage: Arc<BoxedStorage>,
        scheduler: Arc<BoxedScheduler>,
        handler: Arc<dyn AgentHandler>,
        push: PushDispatcher,
        cancellations: CancellationRegistry,
        config: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            scheduler,
            handler,
            push,
            cancellations,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token observed by the worker loops; cancel it to drain the pool.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Spawn the worker loops.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("Starting {} workers", self.config.workers);
        (0..self.config.workers)
            .map(|index| {
                let pool = Arc::clone(self);
                tokio::spawn(async move { pool.run_worker(index).await })
            })
            .collect()
    }

    async fn run_worker(&self, index: usize) {
        debug!("Worker {} started", index);
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.scheduler.dequeue(self.config.poll_timeout).await {
                Ok(Some(task_id)) => self.process_task(task_id).await,
                Ok(None) => continue, // poll timeout: loop back to shutdown check
                Err(err) => {
                    error!("Worker {} dequeue failed: {}", index, err);
                    tokio::time::sleep(self.config.poll_timeout).await;
                }
            }
        }
        debug!("Worker {} stopped", index);
    }

    async fn process_task(&self, task_id: Uuid) {
        // At-most-once guard: only a task still in `submitted` is claimed.
        // Stale queue entries (task gone, already terminal, or picked up by
        // another worker) are dropped silently.
        let task = match self.storage.load_task(task_id, None).await {
            Ok(Some(task)) if task.state == TaskState::Submitted => task,
            Ok(Some(task)) => {
                debug!("Dropping dequeued task {} in state {}", task_id, task.state);
                return;
            }
            Ok(None) => {
                debug!("Dropping dequeued task {}: not in storage", task_id);
                return;
            }
            Err(err) => {
                error!("Loading task {} failed: {}", task_id, err);
                return;
            }
        };

        let task = match self
            .storage
            .update_task(task_id, TaskUpdate::transition(TaskState::Working))
            .await
        {
            Ok(task) => task,
            Err(StorageError::InvalidTransition { .. }) | Err(StorageError::TerminalState(_)) => {
                debug!("Task {} claimed elsewhere; dropping", task_id);
                return;
            }
            Err(err) => {
                error!("Claiming task {} failed: {}", task_id, err);
                return;
            }
        };

        let cancel = self.cancellations.register(task_id);
        let outcome = self.invoke_handler(&task, cancel).await;
        self.cancellations.remove(task_id);

        self.write_outcome(task_id, outcome).await;
    }

    /// Invoke the handler with retries on transient errors. The handler runs
    /// on its own spawned task so a panic marks the task failed instead of
    /// killing the worker loop.
    async fn invoke_handler(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<Value, HandlerError> {
        let history = HandlerTurn::project(&task.history);

        let mut last_error = None;
        for attempt in 0..self.config.max_attempts.max(1) {
            let handler = Arc::clone(&self.handler);
            let history = history.clone();
            let cancel = cancel.clone();

            let joined =
                tokio::spawn(async move { handler.run(history, cancel).await }).await;

            match joined {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(HandlerError::Canceled)) => return Err(HandlerError::Canceled),
                Ok(Err(HandlerError::Transient(reason))) => {
                    warn!(
                        "Handler attempt {}/{} for task {} failed transiently: {}",
                        attempt + 1,
                        self.config.max_attempts,
                        task.id,
                        reason
                    );
                    last_error = Some(HandlerError::Transient(reason));
                    tokio::time::sleep(backoff_interval(
                        self.config.retry_min_wait,
                        self.config.retry_max_wait,
                        attempt,
                    ))
                    .await;
                }
                Ok(Err(fatal)) => return Err(fatal),
                Err(join_error) => {
                    return Err(HandlerError::Fatal(format!(
                        "handler panicked: {}",
                        join_error
                    )));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| HandlerError::Fatal("no handler attempts ran".into())))
    }

    /// Classify the handler result and write the single outcome update. A
    /// `TerminalState` rejection here means the task was canceled while the
    /// handler ran; the output is discarded.
    async fn write_outcome(&self, task_id: Uuid, outcome: Result<Value, HandlerError>) {
        let update = match outcome {
            Ok(value) => match classify_handler_value(value) {
                HandlerOutcome::Reply(parts) => TaskUpdate::transition(TaskState::Completed)
                    .with_message(Message::assistant(parts)),
                HandlerOutcome::Control(directive) => {
                    let state = match directive.state {
                        ControlState::InputRequired => TaskState::InputRequired,
                        ControlState::AuthRequired => TaskState::AuthRequired,
                    };
                    // The task is not re-enqueued: the client's next
                    // message/send on this context reactivates it
                    TaskUpdate::transition(state)
                        .with_message(Message::assistant_text(directive.prompt))
                }
            },
            Err(HandlerError::Canceled) => TaskUpdate::transition(TaskState::Canceled),
            Err(err) => {
                let mut metadata = Map::new();
                metadata.insert("_error".into(), Value::String(err.to_string()));
                TaskUpdate::transition(TaskState::Failed).with_metadata(metadata)
            }
        };

        match self.storage.update_task(task_id, update).await {
            Ok(task) => {
                if task.is_terminal() {
                    self.push.notify_terminal(&task);
                }
            }
            Err(StorageError::TerminalState(state)) => {
                debug!(
                    "Task {} already {}; discarding handler output",
                    task_id, state
                );
            }
            Err(err) => {
                error!("Writing outcome for task {} failed: {}", task_id, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushConfig;
    use crate::handler::FnHandler;
    use bindu_scheduler::{InMemoryScheduler, Scheduler};
    use bindu_storage::{InMemoryStorage, Storage};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyHandler {
        failures: AtomicU32,
    }

    #[async_trait::async_trait]
    impl AgentHandler for FlakyHandler {
        async fn run(
            &self,
            _history: Vec<HandlerTurn>,
            _cancel: CancellationToken,
        ) -> Result<Value, HandlerError> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 1 {
                Err(HandlerError::Transient("warming up".into()))
            } else {
                Ok(json!("recovered"))
            }
        }
    }

    struct CooperativeHandler;

    #[async_trait::async_trait]
    impl AgentHandler for CooperativeHandler {
        async fn run(
            &self,
            _history: Vec<HandlerTurn>,
            cancel: CancellationToken,
        ) -> Result<Value, HandlerError> {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(json!("done")),
                _ = cancel.cancelled() => Err(HandlerError::Canceled),
            }
        }
    }

    fn pool_with(
        handler: Arc<dyn AgentHandler>,
        workers: usize,
    ) -> (Arc<WorkerPool>, Arc<BoxedStorage>, Arc<BoxedScheduler>) {
        let storage: Arc<BoxedStorage> = Arc::new(InMemoryStorage::new());
        let scheduler: Arc<BoxedScheduler> = Arc::new(InMemoryScheduler::new());
        let push = PushDispatcher::new(
            PushConfig {
                enabled: false,
                ..Default::default()
            },
            Arc::clone(&storage),
        );
        let pool = Arc::new(WorkerPool::new(
            Arc::clone(&storage),
            Arc::clone(&scheduler),
            handler,
            push,
            CancellationRegistry::default(),
            WorkerConfig {
                workers,
                poll_timeout: Duration::from_millis(20),
                max_attempts: 3,
                retry_min_wait: Duration::from_millis(5),
                retry_max_wait: Duration::from_millis(20),
            },
        ));
        (pool, storage, scheduler)
    }

    async fn wait_for_state(
        storage: &Arc<BoxedStorage>,
        task_id: Uuid,
        state: TaskState,
    ) -> Task {
        for _ in 0..200 {
            let task = storage.load_task(task_id, None).await.unwrap().unwrap();
            if task.state == state {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never reached {:?}", task_id, state);
    }

    #[tokio::test]
    async fn test_happy_path_completion() {
        let handler = Arc::new(FnHandler::new(|history: Vec<HandlerTurn>| async move {
            let last = history.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(json!(format!("echo: {}", last)))
        }));
        let (pool, storage, scheduler) = pool_with(handler, 2);
        let _handles = pool.spawn();

        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();
        scheduler.enqueue(task.id).await.unwrap();

        let done = wait_for_state(&storage, task.id, TaskState::Completed).await;
        assert_eq!(done.history.len(), 2);
        assert_eq!(done.history[1].text_content(), "echo: hi");
        pool.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_structured_response_pauses_task() {
        let handler = Arc::new(FnHandler::new(|_history: Vec<HandlerTurn>| async move {
            Ok(json!({"state": "input-required", "prompt": "What is your name?"}))
        }));
        let (pool, storage, scheduler) = pool_with(handler, 1);
        let _handles = pool.spawn();

        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();
        scheduler.enqueue(task.id).await.unwrap();

        let paused = wait_for_state(&storage, task.id, TaskState::InputRequired).await;
        assert_eq!(paused.history[1].text_content(), "What is your name?");
        pool.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_transient_errors_retry_without_duplicate_appends() {
        let handler = Arc::new(FlakyHandler {
            failures: AtomicU32::new(3),
        });
        let (pool, storage, scheduler) = pool_with(handler, 1);
        let _handles = pool.spawn();

        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("try hard"))
            .await
            .unwrap();
        scheduler.enqueue(task.id).await.unwrap();

        let done = wait_for_state(&storage, task.id, TaskState::Completed).await;
        // Two failed attempts left no partial output behind
        assert_eq!(done.history.len(), 2);
        assert_eq!(done.history[1].text_content(), "recovered");
        pool.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_fatal_error_fails_task_with_error_metadata() {
        let handler = Arc::new(FnHandler::new(|_history: Vec<HandlerTurn>| async move {
            Err::<Value, _>(HandlerError::Fatal("model exploded".into()))
        }));
        let (pool, storage, scheduler) = pool_with(handler, 1);
        let _handles = pool.spawn();

        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();
        scheduler.enqueue(task.id).await.unwrap();

        let failed = wait_for_state(&storage, task.id, TaskState::Failed).await;
        assert!(
            failed.metadata["_error"]
                .as_str()
                .unwrap()
                .contains("model exploded")
        );
        // No assistant message on failure
        assert_eq!(failed.history.len(), 1);
        pool.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_cooperative_cancellation() {
        let (pool, storage, scheduler) = pool_with(Arc::new(CooperativeHandler), 1);
        let registry = pool.cancellations.clone();
        let _handles = pool.spawn();

        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("long job"))
            .await
            .unwrap();
        scheduler.enqueue(task.id).await.unwrap();
        wait_for_state(&storage, task.id, TaskState::Working).await;

        // Cancel as the task manager would: storage write first, then signal
        storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Canceled))
            .await
            .unwrap();
        assert!(registry.cancel(task.id));

        // The worker observes the signal and discards its output; history
        // still shows only the user message
        tokio::time::sleep(Duration::from_millis(100)).await;
        let final_task = storage.load_task(task.id, None).await.unwrap().unwrap();
        assert_eq!(final_task.state, TaskState::Canceled);
        assert_eq!(final_task.history.len(), 1);
        pool.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_stale_queue_entry_dropped() {
        let handler = Arc::new(FnHandler::new(|_history: Vec<HandlerTurn>| async move {
            Ok(json!("should not run"))
        }));
        let (pool, storage, scheduler) = pool_with(handler, 1);
        let _handles = pool.spawn();

        // Enqueue an id with no backing task, then a canceled task
        scheduler.enqueue(Uuid::new_v4()).await.unwrap();
        let task = storage
            .submit_task(Uuid::new_v4(), Message::user_text("hi"))
            .await
            .unwrap();
        storage
            .update_task(task.id, TaskUpdate::transition(TaskState::Canceled))
            .await
            .unwrap();
        scheduler.enqueue(task.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let untouched = storage.load_task(task.id, None).await.unwrap().unwrap();
        assert_eq!(untouched.state, TaskState::Canceled);
        assert_eq!(untouched.history.len(), 1);
        pool.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_cancellation_registry() {
        let registry = CancellationRegistry::default();
        let task_id = Uuid::new_v4();

        assert!(!registry.cancel(task_id)); // nothing in flight

        let token = registry.register(task_id);
        assert!(!token.is_cancelled());
        assert!(registry.cancel(task_id));
        assert!(token.is_cancelled());

        registry.remove(task_id);
        assert!(!registry.cancel(task_id));
    }
}
