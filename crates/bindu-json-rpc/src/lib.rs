//! # JSON-RPC 2.0 envelopes for the A2A protocol
//!
//! Transport-agnostic JSON-RPC 2.0 request/response types. This crate carries
//! no domain logic: method routing and the A2A error taxonomy live in the
//! server and protocol crates; here are only the wire envelopes and the
//! spec-level error codes.

pub mod error;
pub mod request;
pub mod response;
pub mod types;

pub use error::{JsonRpcError, JsonRpcErrorObject};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
