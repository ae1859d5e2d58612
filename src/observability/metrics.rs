//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define panel metrics (probe outcomes, probe latency, inventory size)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `urls_panel_probes_total` (counter): probes by method and outcome
//! - `urls_panel_probe_duration_seconds` (histogram): probe latency
//! - `urls_panel_inventory_routes` (gauge): routes in the last inventory
//!
//! # Design Decisions
//! - Outcome labels reuse `ProbeError::kind`, so cardinality stays fixed
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape listener. Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record one finished probe.
pub fn record_probe(method: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "urls_panel_probes_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("urls_panel_probe_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Record the size of a freshly built route inventory.
pub fn record_inventory_size(routes: usize) {
    gauge!("urls_panel_inventory_routes").set(routes as f64);
}
