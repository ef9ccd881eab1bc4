//! Prometheus metrics.
//!
//! Counters are recorded through the `metrics` facade; they are exported only
//! once [`init_metrics`] installed the Prometheus recorder, otherwise every
//! call is a no-op.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use qb_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", 201);
//! metrics::quota_rejections_total("free");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use quiz_banner::subscription::{SweepObserver, SweepReport};
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record one finished HTTP request.
///
/// Labelled by method and status only; paths carry IDs and would explode
/// the label cardinality.
pub fn http_requests_total(method: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Resource Metrics
// ============================================================================

/// Increment question quota rejections for a tier.
pub fn quota_rejections_total(tier: &str) {
    metrics::counter!("quota_rejections_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

// ============================================================================
// Subscription Metrics
// ============================================================================

/// Increment subscription transitions (`activate`, `cancel`, `link`, ...).
pub fn subscription_transitions_total(transition: &str) {
    metrics::counter!("subscription_transitions_total",
        "transition" => transition.to_string()
    )
    .increment(1);
}

/// Increment processed payment events by kind and outcome.
pub fn payment_events_total(kind: &str, outcome: &str) {
    metrics::counter!("payment_events_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Sweep Metrics
// ============================================================================

pub fn sweep_expired_total(count: usize) {
    metrics::counter!("sweep_expired_total").increment(count as u64);
}

pub fn sweep_failures_total(count: usize) {
    metrics::counter!("sweep_failures_total").increment(count as u64);
}

pub fn renewal_reminders_total(count: usize) {
    metrics::counter!("renewal_reminders_total").increment(count as u64);
}

/// Sweep observer feeding the sweep counters
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl SweepObserver for MetricsObserver {
    fn on_sweep(&self, report: &SweepReport) {
        tracing::info!(
            expired = report.expired.len(),
            failures = report.failures.len(),
            reminders_due = report.reminders.len(),
            reminders_sent = report.reminders_sent,
            "Daily sweep finished"
        );
        for (principal, error) in &report.failures {
            tracing::error!(principal = %principal, "Sweep could not expire: {}", error);
        }

        sweep_expired_total(report.expired.len());
        sweep_failures_total(report.failures.len());
        renewal_reminders_total(report.reminders_sent);
    }

    fn on_sweep_error(&self, error: &str) {
        tracing::error!("Daily sweep failed: {}", error);
        sweep_failures_total(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_banner::PrincipalRef;

    #[test]
    fn test_counters_without_recorder_are_noops() {
        http_requests_total("GET", 200);
        quota_rejections_total("free");
        subscription_transitions_total("activate");
        payment_events_total("payment_succeeded", "applied");
    }

    #[test]
    fn test_observer_accepts_reports() {
        let report = SweepReport {
            expired: vec![PrincipalRef::Guest("g1".to_string())],
            failures: vec![(PrincipalRef::User("u1".to_string()), "boom".to_string())],
            reminders: Vec::new(),
            reminders_sent: 0,
        };
        MetricsObserver.on_sweep(&report);
        MetricsObserver.on_sweep_error("database unavailable");
    }
}
