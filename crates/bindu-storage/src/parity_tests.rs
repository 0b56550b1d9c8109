//! Backend conformance suite.
//!
//! Every storage backend must pass these checks; the in-memory backend is the
//! reference for semantics and the Postgres backend is compared against it by
//! running the same suite. Each function panics on contract violation, in the
//! style of test assertions.

use crate::error::StorageError;
use crate::traits::{Storage, TaskFilter, TaskUpdate};
use bindu_a2a_protocol::{Message, PushNotificationConfig, TaskState};
use serde_json::json;
use uuid::Uuid;

/// Run the full suite against one backend.
pub(crate) async fn run_all<S: Storage + ?Sized>(storage: &S) {
    submit_round_trip(storage).await;
    state_machine_enforcement(storage).await;
    terminal_immutability(storage).await;
    history_is_monotonic(storage).await;
    state_timestamp_invariant(storage).await;
    feedback_round_trip(storage).await;
    clear_context_cascade(storage).await;
    webhook_round_trip(storage).await;
    list_most_recent_first(storage).await;
    count_by_state(storage).await;
}

/// submit_task(ctx, m); load_task(id) returns the same task with the
/// message's ids filled in.
pub(crate) async fn submit_round_trip<S: Storage + ?Sized>(storage: &S) {
    let context_id = Uuid::new_v4();
    let submitted = storage
        .submit_task(context_id, Message::user_text("round trip"))
        .await
        .expect("submit");

    let loaded = storage
        .load_task(submitted.id, None)
        .await
        .expect("load")
        .expect("task exists after submit");

    assert_eq!(loaded.id, submitted.id);
    assert_eq!(loaded.context_id, context_id);
    assert_eq!(loaded.state, TaskState::Submitted);
    assert_eq!(loaded.history.len(), 1);
    assert_eq!(loaded.history[0].task_id, Some(submitted.id));
    assert_eq!(loaded.history[0].context_id, Some(context_id));
    assert_eq!(loaded.history[0].text_content(), "round trip");

    let context = storage
        .get_context(context_id)
        .await
        .expect("get_context")
        .expect("context created implicitly");
    assert_eq!(context.context_id, context_id);
}

/// Transitions outside the lifecycle table are rejected without mutating.
pub(crate) async fn state_machine_enforcement<S: Storage + ?Sized>(storage: &S) {
    let task = storage
        .submit_task(Uuid::new_v4(), Message::user_text("sm"))
        .await
        .expect("submit");

    // submitted -> completed skips working
    let err = storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Completed))
        .await
        .expect_err("illegal transition must fail");
    assert!(matches!(err, StorageError::InvalidTransition { .. }));

    let unchanged = storage.load_task(task.id, None).await.unwrap().unwrap();
    assert_eq!(unchanged.state, TaskState::Submitted);

    // The legal path works
    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Working))
        .await
        .expect("submitted -> working");
    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::InputRequired))
        .await
        .expect("working -> input-required");
    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Submitted))
        .await
        .expect("input-required -> submitted (resume)");
}

/// Terminal tasks reject every mutation, including pure appends; reads after
/// the terminal write keep returning the same state and history.
pub(crate) async fn terminal_immutability<S: Storage + ?Sized>(storage: &S) {
    let task = storage
        .submit_task(Uuid::new_v4(), Message::user_text("term"))
        .await
        .expect("submit");
    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Canceled))
        .await
        .expect("submitted -> canceled");

    for update in [
        TaskUpdate::transition(TaskState::Working),
        TaskUpdate::append(vec![Message::assistant_text("too late")]),
    ] {
        let err = storage
            .update_task(task.id, update)
            .await
            .expect_err("terminal task must be immutable");
        assert!(matches!(err, StorageError::TerminalState(TaskState::Canceled)));
    }

    let frozen = storage.load_task(task.id, None).await.unwrap().unwrap();
    assert_eq!(frozen.state, TaskState::Canceled);
    assert_eq!(frozen.history.len(), 1);
}

/// History length never decreases across a task's lifetime.
pub(crate) async fn history_is_monotonic<S: Storage + ?Sized>(storage: &S) {
    let task = storage
        .submit_task(Uuid::new_v4(), Message::user_text("h0"))
        .await
        .expect("submit");
    let mut last_len = 1;

    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Working))
        .await
        .unwrap();
    for i in 0..4 {
        let updated = storage
            .update_task(
                task.id,
                TaskUpdate::append(vec![Message::assistant_text(format!("h{}", i + 1))]),
            )
            .await
            .unwrap();
        assert!(updated.history.len() >= last_len);
        last_len = updated.history.len();
    }
    assert_eq!(last_len, 5);
}

/// state_timestamp <= updated_at after every operation, and state_timestamp
/// moves only on state changes.
pub(crate) async fn state_timestamp_invariant<S: Storage + ?Sized>(storage: &S) {
    let task = storage
        .submit_task(Uuid::new_v4(), Message::user_text("ts"))
        .await
        .expect("submit");
    assert!(task.state_timestamp <= task.updated_at);

    let working = storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Working))
        .await
        .unwrap();
    assert!(working.state_timestamp <= working.updated_at);

    let appended = storage
        .update_task(
            task.id,
            TaskUpdate::append(vec![Message::assistant_text("still working")]),
        )
        .await
        .unwrap();
    assert_eq!(appended.state_timestamp, working.state_timestamp);
    assert!(appended.state_timestamp <= appended.updated_at);
}

/// save_feedback(t, f); get_feedback(t) contains f — also on terminal tasks.
pub(crate) async fn feedback_round_trip<S: Storage + ?Sized>(storage: &S) {
    let task = storage
        .submit_task(Uuid::new_v4(), Message::user_text("fb"))
        .await
        .expect("submit");
    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Working))
        .await
        .unwrap();
    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Completed))
        .await
        .unwrap();

    let payload = json!({"rating": 5, "feedback": "Great job!"});
    storage
        .save_feedback(task.id, payload.clone())
        .await
        .expect("feedback on terminal task succeeds");

    let records = storage.get_feedback(task.id).await.unwrap();
    assert!(records.iter().any(|f| f.payload == payload));

    let missing = storage.save_feedback(Uuid::new_v4(), json!({})).await;
    assert!(matches!(missing, Err(StorageError::TaskNotFound(_))));
}

/// clear_context removes the context, its tasks and their feedback.
pub(crate) async fn clear_context_cascade<S: Storage + ?Sized>(storage: &S) {
    let context_id = Uuid::new_v4();
    let t1 = storage
        .submit_task(context_id, Message::user_text("one"))
        .await
        .unwrap();
    let t2 = storage
        .submit_task(context_id, Message::user_text("two"))
        .await
        .unwrap();
    storage.save_feedback(t1.id, json!({"rating": 1})).await.unwrap();

    storage.clear_context(context_id).await.expect("clear");

    assert!(storage.get_context(context_id).await.unwrap().is_none());
    assert!(storage.load_task(t1.id, None).await.unwrap().is_none());
    assert!(storage.load_task(t2.id, None).await.unwrap().is_none());
    assert!(storage.get_feedback(t1.id).await.unwrap().is_empty());
    let listed = storage
        .list_tasks(TaskFilter {
            context_id: Some(context_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(listed.is_empty());

    let contexts = storage.list_contexts().await.unwrap();
    assert!(!contexts.iter().any(|c| c.context_id == context_id));

    let missing = storage.clear_context(context_id).await;
    assert!(matches!(missing, Err(StorageError::ContextNotFound(_))));
}

pub(crate) async fn webhook_round_trip<S: Storage + ?Sized>(storage: &S) {
    let task = storage
        .submit_task(Uuid::new_v4(), Message::user_text("wh"))
        .await
        .unwrap();

    assert!(storage.load_webhook(task.id).await.unwrap().is_none());

    storage
        .save_webhook(
            task.id,
            PushNotificationConfig::new("https://example.com/hook").with_token("secret"),
        )
        .await
        .unwrap();
    let loaded = storage.load_webhook(task.id).await.unwrap().unwrap();
    assert_eq!(loaded.url, "https://example.com/hook");
    assert_eq!(loaded.token.as_deref(), Some("secret"));

    assert!(storage.delete_webhook(task.id).await.unwrap());
    assert!(!storage.delete_webhook(task.id).await.unwrap());
}

pub(crate) async fn list_most_recent_first<S: Storage + ?Sized>(storage: &S) {
    let context_id = Uuid::new_v4();
    let first = storage
        .submit_task(context_id, Message::user_text("older"))
        .await
        .unwrap();
    let _second = storage
        .submit_task(context_id, Message::user_text("newer"))
        .await
        .unwrap();

    // Touching the older task bumps it to the front
    storage
        .update_task(first.id, TaskUpdate::transition(TaskState::Working))
        .await
        .unwrap();

    let listed = storage
        .list_tasks(TaskFilter {
            context_id: Some(context_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);
    assert!(listed[0].updated_at >= listed[1].updated_at);
}

pub(crate) async fn count_by_state<S: Storage + ?Sized>(storage: &S) {
    let context_id = Uuid::new_v4();
    let before_submitted = storage
        .count_tasks(Some(TaskState::Submitted))
        .await
        .unwrap();
    let before_working = storage.count_tasks(Some(TaskState::Working)).await.unwrap();

    let task = storage
        .submit_task(context_id, Message::user_text("count me"))
        .await
        .unwrap();
    assert_eq!(
        storage.count_tasks(Some(TaskState::Submitted)).await.unwrap(),
        before_submitted + 1
    );

    storage
        .update_task(task.id, TaskUpdate::transition(TaskState::Working))
        .await
        .unwrap();
    assert_eq!(
        storage.count_tasks(Some(TaskState::Working)).await.unwrap(),
        before_working + 1
    );
    assert_eq!(
        storage.count_tasks(Some(TaskState::Submitted)).await.unwrap(),
        before_submitted
    );
}
