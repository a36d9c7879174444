//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reload_attempts_total` (counter): reloads that got past the guard, by service
//! - `reload_outcomes_total` (counter): by service and outcome
//! - `reload_duration_seconds` (histogram): guard to outcome, by service
//! - `listener_retries_total` (counter): backoff retries after a notification
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// How a reload attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Published,
    Unchanged,
    Skipped,
    Vetoed,
    SourceFailed,
    TranslateFailed,
}

impl ReloadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadOutcome::Published => "published",
            ReloadOutcome::Unchanged => "unchanged",
            ReloadOutcome::Skipped => "skipped",
            ReloadOutcome::Vetoed => "vetoed",
            ReloadOutcome::SourceFailed => "source_failed",
            ReloadOutcome::TranslateFailed => "translate_failed",
        }
    }
}

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(_) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!("Failed to install Prometheus exporter: {}", e),
    }
}

pub fn record_reload_attempt(service: &str) {
    counter!("reload_attempts_total", "service" => service.to_string()).increment(1);
}

pub fn record_reload_skipped(service: &str) {
    counter!(
        "reload_outcomes_total",
        "service" => service.to_string(),
        "outcome" => ReloadOutcome::Skipped.as_str()
    )
    .increment(1);
}

pub fn record_reload_outcome(service: &str, outcome: ReloadOutcome, started: Instant) {
    counter!(
        "reload_outcomes_total",
        "service" => service.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("reload_duration_seconds", "service" => service.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_listener_retry(service: &str) {
    counter!("listener_retries_total", "service" => service.to_string()).increment(1);
}
