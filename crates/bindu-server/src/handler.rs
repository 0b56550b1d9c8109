//! The user-supplied agent function seam.
//!
//! The runtime invokes the handler with the task's conversation history
//! projected as `[{role, content}]` turns plus a cancellation token, and
//! classifies whatever it returns (see
//! [`bindu_a2a_protocol::classify_handler_value`]). The handler has no access
//! to storage or the scheduler — it communicates only through its input and
//! its return value.

use async_trait::async_trait;
use bindu_a2a_protocol::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// One conversation turn as seen by the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerTurn {
    pub role: Role,
    pub content: String,
}

impl HandlerTurn {
    /// Project a task history into handler turns.
    pub fn project(history: &[Message]) -> Vec<HandlerTurn> {
        history
            .iter()
            .map(|m| HandlerTurn {
                role: m.role,
                content: m.text_content(),
            })
            .collect()
    }
}

/// Errors a handler may raise.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler observed the cancellation token; the task becomes
    /// `canceled`.
    #[error("handler canceled")]
    Canceled,

    /// Transient failure; the worker retries within its configured bounds.
    #[error("transient handler error: {0}")]
    Transient(String),

    /// Permanent failure; the task becomes `failed` immediately.
    #[error("handler error: {0}")]
    Fatal(String),
}

/// The user-supplied agent function.
///
/// A cooperatively cancellable handler checks `cancel` at its yield points;
/// a non-cooperative one runs to completion and its output is discarded if
/// the task was canceled meanwhile.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn run(
        &self,
        history: Vec<HandlerTurn>,
        cancel: CancellationToken,
    ) -> Result<Value, HandlerError>;
}

/// Adapter for plain async closures that ignore the cancellation token.
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> AgentHandler for FnHandler<F>
where
    F: Fn(Vec<HandlerTurn>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn run(
        &self,
        history: Vec<HandlerTurn>,
        _cancel: CancellationToken,
    ) -> Result<Value, HandlerError> {
        (self.func)(history).await
    }
}
