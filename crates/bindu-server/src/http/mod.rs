//! HTTP layer: request routing over hyper.
//!
//! One accept loop feeds many concurrent connection handlers; every endpoint
//! handler borrows the shared [`AppState`]. Responses are fully buffered
//! (`Full<Bytes>`) — streaming is out of scope for this runtime.

mod a2a;
mod discovery;
mod system;

use crate::auth::TokenVerifier;
use crate::manifest::AgentManifest;
use crate::metrics::Metrics;
use crate::task_manager::TaskManager;
use crate::worker::WorkerPool;
use bindu_scheduler::BoxedScheduler;
use bindu_storage::BoxedStorage;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Shared state behind every endpoint handler.
pub struct AppState {
    pub manifest: AgentManifest,
    pub task_manager: TaskManager,
    pub storage: Arc<BoxedStorage>,
    pub scheduler: Arc<BoxedScheduler>,
    pub worker_pool: Arc<WorkerPool>,
    pub metrics: Metrics,
    pub auth_enabled: bool,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub max_body_size: usize,
    pub started_at: Instant,
    /// Serialized agent card, invalidated when the deployment URL changes.
    pub agent_card_cache: tokio::sync::RwLock<Option<Bytes>>,
}

pub type HttpResponse = Response<Full<Bytes>>;

/// Route one request. Called per request from the connection tasks.
pub async fn handle_request(state: Arc<AppState>, req: Request<Incoming>) -> HttpResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    debug!("{} {}", method, path);

    let (endpoint, response) = route(state.clone(), req).await;

    state.metrics.record_request(
        method.as_str(),
        endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Dispatch on (method, path). Returns the normalized endpoint label used
/// for metrics alongside the response.
async fn route(state: Arc<AppState>, req: Request<Incoming>) -> (&'static str, HttpResponse) {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method.as_str(), segments.as_slice()) {
        ("POST", []) => ("/", a2a::a2a_endpoint(state, req).await),
        ("GET", []) => ("/", redirect_to_agent_card()),

        ("GET" | "HEAD", [".well-known", "agent.json"]) => (
            "/.well-known/agent.json",
            discovery::agent_card_endpoint(state, method == Method::HEAD).await,
        ),

        ("POST" | "GET", ["did", "resolve"]) => {
            ("/did/resolve", discovery::did_resolve_endpoint(state, req).await)
        }

        ("GET", ["agent", "skills"]) => {
            ("/agent/skills", discovery::skills_list_endpoint(state))
        }
        ("GET", ["agent", "skills", skill_id]) => (
            "/agent/skills/{id}",
            discovery::skill_detail_endpoint(state, skill_id),
        ),
        ("GET", ["agent", "skills", skill_id, "documentation"]) => (
            "/agent/skills/{id}/documentation",
            discovery::skill_documentation_endpoint(state, skill_id),
        ),

        ("GET", ["health"]) => ("/health", system::health_endpoint(state).await),
        ("GET", ["metrics"]) => ("/metrics", system::metrics_endpoint(state).await),

        _ => ("unknown", not_found()),
    }
}

fn redirect_to_agent_card() -> HttpResponse {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(hyper::header::LOCATION, "/.well-known/agent.json")
        .body(Full::new(Bytes::new()))
        .expect("static response builds")
}

pub(crate) fn not_found() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from("Not Found")))
        .expect("static response builds")
}

pub(crate) fn json_response(status: StatusCode, body: Bytes) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(body))
        .expect("response builds")
}

pub(crate) fn json_value_response(status: StatusCode, value: &serde_json::Value) -> HttpResponse {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    json_response(status, Bytes::from(body))
}

/// JSON-RPC error envelope as an HTTP response (used outside the normal
/// dispatch path: parse failures, auth rejections, internal errors).
pub(crate) fn jsonrpc_error_response(
    status: StatusCode,
    code: i64,
    message: &str,
    data: Option<String>,
    request_id: Option<bindu_json_rpc::RequestId>,
) -> HttpResponse {
    let error = bindu_json_rpc::JsonRpcError::new(
        request_id,
        bindu_json_rpc::JsonRpcErrorObject::new(code, message, data.map(serde_json::Value::String)),
    );
    let body = serde_json::to_vec(&error).unwrap_or_else(|_| b"{}".to_vec());
    json_response(status, Bytes::from(body))
}
