//! Prometheus metrics for monitoring server health.
//!
//! Metrics are exposed on a separate listener (configured via
//! `METRICS_BIND`) in Prometheus text format.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

/// An authenticated socket came up.
pub fn socket_connected() {
    metrics::gauge!("fc_sockets_active").increment(1.0);
    metrics::counter!("fc_sockets_total").increment(1);
}

/// An authenticated socket went away.
pub fn socket_disconnected() {
    metrics::gauge!("fc_sockets_active").decrement(1.0);
}

/// One game command processed, labelled by outcome.
pub fn command_processed(kind: &'static str, ok: bool) {
    metrics::counter!("fc_commands_total",
        "kind" => kind,
        "ok" => if ok { "true" } else { "false" }
    )
    .increment(1);
}

/// Games rehydrated at boot.
pub fn games_rehydrated(count: u64) {
    metrics::gauge!("fc_games_rehydrated").set(count as f64);
}
