//! The closed A2A error taxonomy.
//!
//! Every protocol-boundary failure maps to one of these kinds; the JSON-RPC
//! layer serializes them as `{code, message, data}` error objects.

use bindu_json_rpc::JsonRpcErrorObject;
use thiserror::Error;
use uuid::Uuid;

/// A2A protocol errors surfaced as JSON-RPC error objects.
#[derive(Debug, Error)]
pub enum A2aError {
    #[error("Invalid payload")]
    JsonParse(String),

    #[error("Request payload validation error")]
    InvalidRequest(String),

    #[error("Method not found")]
    MethodNotFound(String),

    #[error("Invalid parameters")]
    InvalidParams(String),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Invalid task state transition")]
    InvalidStateTransition(String),

    #[error("Context not found: {0}")]
    ContextNotFound(Uuid),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("Push notifications are not supported")]
    PushNotSupported,

    #[error("Invalid or missing token")]
    InvalidToken(String),

    #[error("Internal error")]
    Internal(String),
}

impl A2aError {
    /// The JSON-RPC error code for this kind.
    pub fn code(&self) -> i64 {
        match self {
            A2aError::JsonParse(_) => -32700,
            A2aError::InvalidRequest(_) => -32600,
            A2aError::MethodNotFound(_) => -32601,
            A2aError::InvalidParams(_) => -32602,
            A2aError::TaskNotFound(_) => -32001,
            A2aError::InvalidStateTransition(_) => -32002,
            A2aError::ContextNotFound(_) => -32003,
            A2aError::SkillNotFound(_) => -32004,
            A2aError::PushNotSupported => -32005,
            A2aError::InvalidToken(_) => -32006,
            A2aError::Internal(_) => -32603,
        }
    }

    /// Detail string carried in the error object's `data` member.
    fn data(&self) -> Option<String> {
        match self {
            A2aError::JsonParse(detail)
            | A2aError::InvalidRequest(detail)
            | A2aError::InvalidParams(detail)
            | A2aError::InvalidStateTransition(detail)
            | A2aError::InvalidToken(detail)
            | A2aError::Internal(detail) => Some(detail.clone()),
            A2aError::MethodNotFound(method) => {
                Some(format!("Method '{}' is not implemented", method))
            }
            A2aError::TaskNotFound(_)
            | A2aError::ContextNotFound(_)
            | A2aError::SkillNotFound(_)
            | A2aError::PushNotSupported => None,
        }
    }
}

impl From<&A2aError> for JsonRpcErrorObject {
    fn from(err: &A2aError) -> Self {
        JsonRpcErrorObject::new(
            err.code(),
            err.to_string(),
            err.data().map(serde_json::Value::String),
        )
    }
}

impl From<A2aError> for JsonRpcErrorObject {
    fn from(err: A2aError) -> Self {
        (&err).into()
    }
}
