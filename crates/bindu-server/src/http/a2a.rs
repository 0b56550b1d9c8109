//! The A2A protocol endpoint: JSON-RPC 2.0 over `POST /`.

use super::{jsonrpc_error_response, AppState, HttpResponse};
use crate::auth::bearer_token;
use bindu_a2a_protocol::A2aError;
use bindu_json_rpc::{error_codes, JsonRpcMessage, JsonRpcRequest};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use std::sync::Arc;
use tracing::warn;

/// Handle one A2A request.
///
/// The server always answers `message/send` with a `submitted` (or an error
/// envelope) — never a synchronous `completed`; completion is observed by
/// polling `tasks/get`.
pub async fn a2a_endpoint(state: Arc<AppState>, req: Request<Incoming>) -> HttpResponse {
    // Auth gate (the verifier itself is a collaborator)
    if state.auth_enabled {
        if let Some(response) = check_auth(&state, &req).await {
            return response;
        }
    }

    let body = match Limited::new(req.into_body(), state.max_body_size)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!("A2A request body rejected: {}", err);
            return jsonrpc_error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                error_codes::INVALID_REQUEST,
                "Request payload validation error",
                Some("request body too large".to_string()),
                None,
            );
        }
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!("Invalid A2A request: {}", err);
            return jsonrpc_error_response(
                StatusCode::BAD_REQUEST,
                error_codes::PARSE_ERROR,
                "Invalid payload",
                Some(err.to_string()),
                None,
            );
        }
    };

    let response = state.task_manager.handle(request).await;
    respond(response)
}

async fn check_auth(state: &AppState, req: &Request<Incoming>) -> Option<HttpResponse> {
    let token = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    let rejection = match (token, state.verifier.as_ref()) {
        (Some(token), Some(verifier)) => match verifier.verify(token).await {
            Ok(()) => None,
            Err(err) => Some(err.to_string()),
        },
        (None, _) => Some("missing bearer token".to_string()),
        (_, None) => Some("no token verifier configured".to_string()),
    };

    rejection.map(|detail| {
        warn!("A2A request rejected by auth: {}", detail);
        let err = A2aError::InvalidToken(detail);
        jsonrpc_error_response(
            StatusCode::UNAUTHORIZED,
            err.code(),
            &err.to_string(),
            None,
            None,
        )
    })
}

/// Serialize the envelope. Domain errors travel inside a 200 response;
/// protocol-level failures map onto HTTP statuses.
fn respond(message: JsonRpcMessage) -> HttpResponse {
    let status = match &message {
        JsonRpcMessage::Response(_) => StatusCode::OK,
        JsonRpcMessage::Error(err) => match err.error.code {
            error_codes::METHOD_NOT_FOUND => StatusCode::NOT_FOUND,
            error_codes::PARSE_ERROR | error_codes::INVALID_REQUEST | error_codes::INVALID_PARAMS => {
                StatusCode::BAD_REQUEST
            }
            error_codes::INTERNAL_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK, // domain errors: the envelope carries the code
        },
    };

    let body = serde_json::to_vec(&message).unwrap_or_else(|_| b"{}".to_vec());
    super::json_response(status, Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindu_json_rpc::{JsonRpcError, RequestId};

    #[test]
    fn test_status_mapping() {
        let ok = JsonRpcMessage::success(RequestId::Number(1), serde_json::json!({}));
        assert_eq!(respond(ok).status(), StatusCode::OK);

        let not_found: JsonRpcMessage =
            JsonRpcError::method_not_found(RequestId::Number(1), "x").into();
        assert_eq!(respond(not_found).status(), StatusCode::NOT_FOUND);

        let bad_params: JsonRpcMessage =
            JsonRpcError::invalid_params(RequestId::Number(1), "missing").into();
        assert_eq!(respond(bad_params).status(), StatusCode::BAD_REQUEST);

        // Domain errors stay 200 with the code in the envelope
        let domain: JsonRpcMessage = JsonRpcError::new(
            Some(RequestId::Number(1)),
            bindu_json_rpc::JsonRpcErrorObject::new(-32001, "Task not found", None),
        )
        .into();
        assert_eq!(respond(domain).status(), StatusCode::OK);
    }
}
