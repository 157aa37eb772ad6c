//! Metrics collection and exposition.
//!
//! # Metrics
//! - `transport_connections_accepted_total` (counter)
//! - `transport_handshakes_total{outcome}` (counter): secured, failed, cancelled
//! - `transport_client_certificates_total{verdict}` (counter): hook verdicts
//! - `transport_certificate_checks_total{result}` (counter): pinning chain results
//! - `transport_bytes_sent_total` / `transport_bytes_received_total` (counters)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_accept() {
    ::metrics::counter!("transport_connections_accepted_total").increment(1);
}

pub fn record_handshake(outcome: &'static str) {
    ::metrics::counter!("transport_handshakes_total", "outcome" => outcome).increment(1);
}

pub fn record_client_certificate(accepted: bool) {
    let verdict = if accepted { "accepted" } else { "flagged" };
    ::metrics::counter!("transport_client_certificates_total", "verdict" => verdict).increment(1);
}

pub fn record_certificate_check(passed: bool) {
    let result = if passed { "match" } else { "mismatch" };
    ::metrics::counter!("transport_certificate_checks_total", "result" => result).increment(1);
}

pub fn record_bytes_sent(bytes: usize) {
    ::metrics::counter!("transport_bytes_sent_total").increment(bytes as u64);
}

pub fn record_bytes_received(bytes: usize) {
    ::metrics::counter!("transport_bytes_received_total").increment(bytes as u64);
}
