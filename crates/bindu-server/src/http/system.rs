//! Health and metrics endpoints.

use super::{json_value_response, AppState, HttpResponse};
use bindu_a2a_protocol::TaskState;
use bindu_scheduler::Scheduler;
use bindu_storage::Storage;
use bytes::Bytes;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// `GET /health` — liveness plus component readiness.
pub async fn health_endpoint(state: Arc<AppState>) -> HttpResponse {
    let uptime = state.started_at.elapsed().as_secs_f64();
    let worker_running = state.worker_pool.is_running();

    let ready = worker_running;
    let payload = json!({
        "status": "ok",
        "ready": ready,
        "uptime_seconds": (uptime * 100.0).round() / 100.0,
        "version": env!("CARGO_PKG_VERSION"),
        "health": if ready { "healthy" } else { "degraded" },
        "runtime": {
            "storage_backend": state.storage.backend_name(),
            "scheduler_backend": state.scheduler.backend_name(),
            "worker_pool_running": worker_running,
        },
        "application": {
            "agent_id": state.manifest.id,
            "agent_did": state.manifest.did.as_ref().map(|d| d.did.clone()),
        },
    });

    json_value_response(StatusCode::OK, &payload)
}

/// `GET /metrics` — Prometheus text format. The per-agent active-task gauge
/// is refreshed from storage at scrape time.
pub async fn metrics_endpoint(state: Arc<AppState>) -> HttpResponse {
    update_agent_metrics(&state).await;

    let text = state.metrics.encode();
    Response::builder()
        .status(StatusCode::OK)
        .header(
            hyper::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )
        .header(hyper::header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .body(http_body_util::Full::new(Bytes::from(text)))
        .expect("response builds")
}

async fn update_agent_metrics(state: &AppState) {
    let agent = state
        .manifest
        .did
        .as_ref()
        .map(|d| d.did.clone())
        .unwrap_or_else(|| state.manifest.id.to_string());

    let mut active: i64 = 0;
    for task_state in [
        TaskState::Submitted,
        TaskState::Working,
        TaskState::InputRequired,
        TaskState::AuthRequired,
    ] {
        match state.storage.count_tasks(Some(task_state)).await {
            Ok(count) => active += count as i64,
            Err(err) => {
                debug!("Active task count failed: {}", err);
                return;
            }
        }
    }
    state.metrics.set_agent_tasks_active(&agent, active);
}
