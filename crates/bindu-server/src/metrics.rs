//! Prometheus metrics.
//!
//! HTTP counters and latency histograms recorded by the router, plus a
//! per-agent active-task gauge refreshed from storage at scrape time.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Metric handles shared across the HTTP layer.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    agent_tasks_active: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("valid metric definition");
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["endpoint"],
        )
        .expect("valid metric definition");
        let agent_tasks_active = IntGaugeVec::new(
            Opts::new("agent_tasks_active", "Currently active tasks per agent"),
            &["agent"],
        )
        .expect("valid metric definition");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http_requests_total");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("register http_request_duration_seconds");
        registry
            .register(Box::new(agent_tasks_active.clone()))
            .expect("register agent_tasks_active");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            agent_tasks_active,
        }
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status: u16, elapsed_secs: f64) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(elapsed_secs);
    }

    pub fn set_agent_tasks_active(&self, agent: &str, count: i64) {
        self.agent_tasks_active
            .with_label_values(&[agent])
            .set(count);
    }

    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Metrics encoding failed: {}", err);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_encode() {
        let metrics = Metrics::new();
        metrics.record_request("POST", "/", 200, 0.012);
        metrics.record_request("GET", "/health", 200, 0.001);
        metrics.set_agent_tasks_active("did:bindu:alice:echo", 3);

        let text = metrics.encode();
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("http_request_duration_seconds"));
        assert!(text.contains("agent_tasks_active"));
        assert!(text.contains("did:bindu:alice:echo"));
    }
}
