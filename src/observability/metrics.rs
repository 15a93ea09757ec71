//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (requests, latency, packets, backend state)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `lb_requests_total` (counter): proxied requests by method, status, backend
//! - `lb_request_duration_seconds` (histogram): proxy latency
//! - `lb_packets_total` (counter): packet outcomes by status
//! - `lb_backend_health` (gauge): 1=available, 0=unavailable
//! - `lb_backend_connections` (gauge): in-flight dispatches per backend
//! - `lb_control_commands_total` (counter): control-plane commands by action
//! - `lb_control_connections` (gauge): open control-plane connections
//!
//! Recording without an installed exporter is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "lb_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    metrics::histogram!("lb_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_packet(status: &str) {
    metrics::counter!("lb_packets_total", "status" => status.to_string()).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("lb_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_backend_connections(backend: &str, connections: usize) {
    metrics::gauge!("lb_backend_connections", "backend" => backend.to_string())
        .set(connections as f64);
}

pub fn record_control_command(action: &str) {
    metrics::counter!("lb_control_commands_total", "action" => action.to_string()).increment(1);
}

pub fn control_connection_opened() {
    metrics::gauge!("lb_control_connections").increment(1.0);
}

pub fn control_connection_closed() {
    metrics::gauge!("lb_control_connections").decrement(1.0);
}
