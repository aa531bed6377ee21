//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proto_registry_reloads_total` (counter): reload attempts by direction, outcome
//! - `proto_registry_route_lookups_total` (counter): cache lookups by direction, result
//! - `proto_registry_codec_errors_total` (counter): encode/decode failures by op
//! - `proto_registry_version` (gauge): current schema version
//! - `proto_registry_backend_available` (gauge): 1 when a direction has a backend

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::schema::Direction;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_reload(direction: Direction, outcome: &'static str) {
    counter!(
        "proto_registry_reloads_total",
        "direction" => direction.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_lookup(direction: Direction, cached: bool) {
    counter!(
        "proto_registry_route_lookups_total",
        "direction" => direction.as_str(),
        "result" => if cached { "hit" } else { "miss" }
    )
    .increment(1);
}

pub fn record_codec_error(op: &'static str) {
    counter!("proto_registry_codec_errors_total", "op" => op).increment(1);
}

pub fn record_version(version: u64) {
    gauge!("proto_registry_version").set(version as f64);
}

pub fn record_backend_available(direction: Direction, available: bool) {
    gauge!("proto_registry_backend_available", "direction" => direction.as_str())
        .set(if available { 1.0 } else { 0.0 });
}
