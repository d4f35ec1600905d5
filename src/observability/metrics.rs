//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cache_proxy_requests_total` (counter): requests by outcome (hit, miss, error)
//! - `cache_proxy_request_duration_seconds` (histogram): latency by outcome
//! - `cache_proxy_upstream_fetches_total` (counter): upstream responses by status
//! - `cache_proxy_cache_write_failures_total` (counter): failed cache writes
//!
//! Recording is a no-op until a recorder is installed, so the exporter is
//! optional.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::Error => "error",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: Outcome, start: Instant) {
    counter!("cache_proxy_requests_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("cache_proxy_request_duration_seconds", "outcome" => outcome.as_str())
        .record(start.elapsed().as_secs_f64());
}

/// A request whose handler panicked; no latency is recorded.
pub fn record_panic() {
    counter!("cache_proxy_requests_total", "outcome" => Outcome::Error.as_str()).increment(1);
}

pub fn record_upstream_fetch(status: u16) {
    counter!("cache_proxy_upstream_fetches_total", "status" => status.to_string()).increment(1);
}

pub fn record_cache_write_failure() {
    counter!("cache_proxy_cache_write_failures_total").increment(1);
}
