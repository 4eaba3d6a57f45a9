//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_preimage_submissions_total` (counter): submissions by outcome
//! - `gate_ledger_size` (gauge): retained preimages
//! - `gate_ledger_evictions_total` (counter): records dropped by the capacity rule
//! - `gate_secrets_issued_total` (counter): secrets handed out
//! - `gate_decisions_total` (counter): gate decisions by kind
//! - `gate_downstream_duration_seconds` (histogram): time spent downstream
//!
//! Without an installed recorder every call is a no-op, so tests and
//! library users pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_submission(outcome: &'static str) {
    counter!("gate_preimage_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_ledger_size(size: usize) {
    gauge!("gate_ledger_size").set(size as f64);
}

pub fn record_evictions(count: usize) {
    counter!("gate_ledger_evictions_total").increment(count as u64);
}

pub fn record_secret_issued() {
    counter!("gate_secrets_issued_total").increment(1);
}

pub fn record_decision(decision: &'static str) {
    counter!("gate_decisions_total", "decision" => decision).increment(1);
}

pub fn record_downstream(status: u16, start: Instant) {
    histogram!("gate_downstream_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}
