//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_forwards_total` (counter): finished forwards by host, outcome
//! - `proxy_forward_duration_seconds` (histogram): dispatch to terminal state
//! - `proxy_rejections_total` (counter): requests refused by the allowlist
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is optional and owns its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a forward reaching a terminal state.
pub fn record_forward(host: &str, outcome: &'static str, started: Instant) {
    metrics::counter!(
        "proxy_forwards_total",
        "host" => host.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "proxy_forward_duration_seconds",
        "host" => host.to_string(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record a request refused before any upstream call.
pub fn record_rejection() {
    metrics::counter!("proxy_rejections_total").increment(1);
}
