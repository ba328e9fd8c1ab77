//! Metrics collection and exposition.
//!
//! # Metrics
//! - `correlator_sessions_total` (counter): finished sessions by outcome
//! - `correlator_session_duration_seconds` (histogram): session wall time
//! - `correlator_blocks_scanned_total` (counter): blocks handed to the matcher
//! - `correlator_matches_total` (counter): attributed events by tier
//! - `correlator_ambiguous_matches_total` (counter): strict matches sharing a signer in one block
//! - `correlator_submissions_total` (counter): dispatched units by outcome
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record the end of a correlation session.
pub fn record_session(outcome: &'static str, started: Instant) {
    counter!("correlator_sessions_total", "outcome" => outcome).increment(1);
    histogram!("correlator_session_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record one scanned block.
pub fn record_block_scanned() {
    counter!("correlator_blocks_scanned_total").increment(1);
}

/// Record attributed events for one block.
pub fn record_matches(tier: &'static str, count: usize) {
    counter!("correlator_matches_total", "tier" => tier).increment(count as u64);
}

/// Record strict matches that could not be told apart.
pub fn record_ambiguous(count: usize) {
    counter!("correlator_ambiguous_matches_total").increment(count as u64);
}

/// Record a terminal submission outcome.
pub fn record_submission(outcome: &'static str) {
    counter!("correlator_submissions_total", "outcome" => outcome).increment(1);
}
