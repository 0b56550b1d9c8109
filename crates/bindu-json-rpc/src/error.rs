use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error object (the `error` member of a response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(crate::error_codes::PARSE_ERROR, "Parse error", data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(crate::error_codes::INVALID_REQUEST, "Invalid Request", data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            crate::error_codes::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(crate::error_codes::INVALID_PARAMS, message, None)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(crate::error_codes::INTERNAL_ERROR, message, None)
    }
}

/// JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error(None))
    }

    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request(None))
    }

    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(Some(id), JsonRpcErrorObject::method_not_found(method))
    }

    pub fn invalid_params(id: RequestId, message: &str) -> Self {
        Self::new(Some(id), JsonRpcErrorObject::invalid_params(message))
    }

    pub fn internal_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::internal_error(message))
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcErrorObject::parse_error(None).code, -32700);
        assert_eq!(JsonRpcErrorObject::method_not_found("x").code, -32601);
    }

    #[test]
    fn test_error_serialization() {
        let error = JsonRpcError::method_not_found(RequestId::Number(1), "tasks/evaporate");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("Method 'tasks/evaporate' not found"));
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
    }

    #[test]
    fn test_error_with_null_id() {
        let json = serde_json::to_string(&JsonRpcError::parse_error()).unwrap();
        assert!(json.contains("\"id\":null"));
    }
}
