//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_rejected_requests_total` (counter): requests refused by a closed gate, by server
//! - `server_stop_failures_total` (counter): failed graceful stops, by server
//! - `shutdown_phase_duration_seconds` (histogram): time spent per shutdown phase
//! - `shutdown_forced_exits_total` (counter): watchdog terminations, by reason
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_rejected(server: &str) {
    counter!("gate_rejected_requests_total", "server" => server.to_string()).increment(1);
}

pub fn record_stop_failure(server: &str) {
    counter!("server_stop_failures_total", "server" => server.to_string()).increment(1);
}

pub fn record_phase(phase: &'static str, started: Instant) {
    histogram!("shutdown_phase_duration_seconds", "phase" => phase)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_forced_exit(reason: &'static str) {
    counter!("shutdown_forced_exits_total", "reason" => reason).increment(1);
}
