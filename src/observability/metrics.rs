//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hostgate_requests_total` (counter): requests by listener and outcome
//! - `hostgate_request_duration_seconds` (histogram): latency distribution
//! - `hostgate_sync_total` (counter): sync attempts by result
//! - `hostgate_routing_table_entries` (gauge): size of the published table
//! - `hostgate_invalid_entries_total` (counter): entries dropped during sync
//! - `hostgate_policy_reloads_total` (counter): policy updates by listener and result
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(listener: &str, outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "hostgate_requests_total",
        "listener" => listener.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("hostgate_request_duration_seconds", "listener" => listener.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_sync(result: &'static str) {
    counter!("hostgate_sync_total", "result" => result).increment(1);
}

pub fn record_table_size(entries: usize) {
    gauge!("hostgate_routing_table_entries").set(entries as f64);
}

pub fn record_invalid_entries(count: usize) {
    counter!("hostgate_invalid_entries_total").increment(count as u64);
}

pub fn record_policy_reload(listener: &str, result: &'static str) {
    counter!(
        "hostgate_policy_reloads_total",
        "listener" => listener.to_string(),
        "result" => result
    )
    .increment(1);
}
