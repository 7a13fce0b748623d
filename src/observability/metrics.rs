//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frame_shutdown_hooks_total` (counter): hook outcomes by hook, outcome
//! - `frame_process_transitions_total` (counter): state changes by process, state
//! - `frame_active_connections` (gauge): open connections per process
//! - `frame_rpc_calls_total` (counter): RPC dispatches by method, outcome
//! - `frame_gateway_requests_total` (counter): gateway responses by route, status

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_hook_outcome(hook: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("frame_shutdown_hooks_total", "hook" => hook.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_process_state(process: &'static str, state: &'static str) {
    counter!("frame_process_transitions_total", "process" => process, "state" => state).increment(1);
}

pub fn record_active_connections(process: &'static str, count: u64) {
    gauge!("frame_active_connections", "process" => process).set(count as f64);
}

pub fn record_rpc_call(method: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("frame_rpc_calls_total", "method" => method.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_gateway_request(route: &str, status: u16) {
    counter!("frame_gateway_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
}
