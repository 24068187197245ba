//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): completed requests by backend, outcome
//! - `dispatch_active_requests` (gauge): in-flight requests per backend
//! - `dispatch_backend_health` (gauge): 1=available, 0=unavailable
//! - `dispatch_failovers_total` (counter): failover hops by origin and target
//! - `dispatch_circuit_opened_total` (counter): circuit breaker trips per backend
//!
//! # Design Decisions
//! - Recorder is process-global; record_* helpers are no-ops until
//!   `init_metrics` installs the Prometheus exporter
//! - Labels carry the backend name only, to keep cardinality bounded

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint.
///
/// Must run inside a tokio runtime. Failure to bind is logged, not fatal:
/// the dispatch path works without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record a probe or usage verdict for one backend.
pub fn record_backend_health(backend: &str, available: bool) {
    let value = if available { 1.0 } else { 0.0 };
    metrics::gauge!("dispatch_backend_health", "backend" => backend.to_string()).set(value);
}

/// Update the in-flight request gauge for one backend.
pub fn record_active_requests(backend: &str, active: usize) {
    metrics::gauge!("dispatch_active_requests", "backend" => backend.to_string())
        .set(active as f64);
}

/// Count one completed request.
pub fn record_request_outcome(backend: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "dispatch_requests_total",
        "backend" => backend.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Count one failover hop.
pub fn record_failover(from: &str, to: &str) {
    metrics::counter!(
        "dispatch_failovers_total",
        "from" => from.to_string(),
        "to" => to.to_string(),
    )
    .increment(1);
}

/// Count one circuit breaker trip.
pub fn record_circuit_open(backend: &str) {
    metrics::counter!("dispatch_circuit_opened_total", "backend" => backend.to_string())
        .increment(1);
}
