//! Discovery endpoints: agent card, skills, DID resolution.

use super::{json_response, json_value_response, jsonrpc_error_response, AppState, HttpResponse};
use bindu_a2a_protocol::A2aError;
use bindu_json_rpc::error_codes;
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// `GET /.well-known/agent.json` — the cached discovery document.
pub async fn agent_card_endpoint(state: Arc<AppState>, head_only: bool) -> HttpResponse {
    {
        let cache = state.agent_card_cache.read().await;
        if let Some(ref bytes) = *cache {
            return card_response(bytes.clone(), head_only);
        }
    }

    debug!("Generating agent card schema");
    let card = state.manifest.agent_card();
    let bytes = match serde_json::to_vec(&card) {
        Ok(body) => Bytes::from(body),
        Err(err) => {
            warn!("Agent card serialization failed: {}", err);
            return jsonrpc_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "Internal error",
                Some(err.to_string()),
                None,
            );
        }
    };

    let mut cache = state.agent_card_cache.write().await;
    *cache = Some(bytes.clone());
    card_response(bytes, head_only)
}

fn card_response(bytes: Bytes, head_only: bool) -> HttpResponse {
    let body = if head_only { Bytes::new() } else { bytes };
    json_response(StatusCode::OK, body)
}

/// `GET /agent/skills` — summary list for orchestrator discovery.
pub fn skills_list_endpoint(state: Arc<AppState>) -> HttpResponse {
    let skills: Vec<serde_json::Value> = state
        .manifest
        .skills
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "description": s.description,
                "version": s.version,
                "tags": s.tags,
                "input_modes": s.input_modes,
                "output_modes": s.output_modes,
                "examples": s.examples,
            })
        })
        .collect();

    let total = skills.len();
    json_value_response(StatusCode::OK, &json!({"skills": skills, "total": total}))
}

/// `GET /agent/skills/{id}` — full metadata minus the documentation body.
pub fn skill_detail_endpoint(state: Arc<AppState>, skill_id: &str) -> HttpResponse {
    match state.manifest.find_skill(skill_id) {
        Some(skill) => json_value_response(StatusCode::OK, &skill.detail()),
        None => skill_not_found(skill_id),
    }
}

/// `GET /agent/skills/{id}/documentation` — the raw YAML body.
pub fn skill_documentation_endpoint(state: Arc<AppState>, skill_id: &str) -> HttpResponse {
    let Some(skill) = state.manifest.find_skill(skill_id) else {
        return skill_not_found(skill_id);
    };
    match skill.documentation_content {
        Some(ref documentation) => Response::builder()
            .status(StatusCode::OK)
            .header(hyper::header::CONTENT_TYPE, "application/yaml")
            .body(http_body_util::Full::new(Bytes::from(documentation.clone())))
            .expect("response builds"),
        None => skill_not_found(skill_id),
    }
}

fn skill_not_found(skill_id: &str) -> HttpResponse {
    let err = A2aError::SkillNotFound(skill_id.to_string());
    jsonrpc_error_response(StatusCode::NOT_FOUND, err.code(), &err.to_string(), None, None)
}

/// `POST /did/resolve` — return the W3C DID document iff the requested DID
/// is this agent's own.
pub async fn did_resolve_endpoint(state: Arc<AppState>, req: Request<Incoming>) -> HttpResponse {
    let body = match Limited::new(req.into_body(), state.max_body_size)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return jsonrpc_error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                error_codes::INVALID_REQUEST,
                "Request payload validation error",
                Some(err.to_string()),
                None,
            );
        }
    };

    let parsed: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return jsonrpc_error_response(
                StatusCode::BAD_REQUEST,
                error_codes::PARSE_ERROR,
                "Invalid payload",
                Some(err.to_string()),
                None,
            );
        }
    };

    let Some(requested) = parsed.get("did").and_then(serde_json::Value::as_str) else {
        return jsonrpc_error_response(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMS,
            "Invalid parameters",
            Some("Missing 'did' parameter".to_string()),
            None,
        );
    };

    match state.manifest.did {
        Some(ref identity) if identity.did == requested => {
            let document = identity.document(&state.manifest.url);
            json_value_response(
                StatusCode::OK,
                &serde_json::to_value(&document).unwrap_or_default(),
            )
        }
        _ => {
            debug!("DID resolve miss: {}", requested);
            jsonrpc_error_response(
                StatusCode::NOT_FOUND,
                error_codes::INTERNAL_ERROR,
                "Internal error",
                Some(format!("DID '{}' not found", requested)),
                None,
            )
        }
    }
}
