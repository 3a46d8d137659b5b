//! Prometheus metrics for monitoring wallet and session activity.
//!
//! Metrics are exposed in Prometheus text format on a dedicated scrape
//! endpoint (see `METRICS_BIND`).

use metrics_exporter_prometheus::PrometheusBuilder;
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

/// Record a completed top-up with its credited amount.
pub fn topups_total(amount: f64, with_bonus: bool) {
    metrics::counter!("wallet_topups_total",
        "with_bonus" => with_bonus.to_string()
    )
    .increment(1);
    metrics::histogram!("wallet_topup_amount").record(amount);
}

/// Record a session lifecycle transition.
pub fn session_transitions_total(transition: &'static str) {
    metrics::counter!("session_transitions_total",
        "transition" => transition
    )
    .increment(1);
}

/// Record a rejected reservation for lack of available balance.
pub fn insufficient_funds_total() {
    metrics::counter!("wallet_insufficient_funds_total").increment(1);
}

/// Record a refund with its amount.
pub fn refunds_total(amount: f64) {
    metrics::counter!("wallet_refunds_total").increment(1);
    metrics::histogram!("wallet_refund_amount").record(amount);
}
