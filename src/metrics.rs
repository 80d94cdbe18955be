//! Prometheus-facing counters and gauges.
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing for these calls.

use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::models::{DerivedStatus, EventType, FleetSummary, SelfReportedStatus};

pub const REGISTRATIONS: &str = "mesh_registrations_total";
pub const HEARTBEATS: &str = "mesh_heartbeats_total";
pub const UNKNOWN_NODE_HEARTBEATS: &str = "mesh_unknown_node_heartbeats_total";
pub const HISTORY_EVENTS: &str = "mesh_history_events_total";
pub const LIVENESS_TRANSITIONS: &str = "mesh_liveness_transitions_total";
pub const NODES: &str = "mesh_nodes";
pub const STORAGE_FAILURES: &str = "mesh_storage_failures_total";

/// Install the global recorder and serve `/metrics` on `port`.
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

pub fn record_registration() {
    counter!(REGISTRATIONS).increment(1);
}

pub fn record_heartbeat(status: SelfReportedStatus) {
    counter!(HEARTBEATS, "status" => status.as_str()).increment(1);
}

pub fn record_unknown_node() {
    counter!(UNKNOWN_NODE_HEARTBEATS).increment(1);
}

pub fn record_event(event_type: EventType) {
    counter!(HISTORY_EVENTS, "event_type" => event_type.as_str()).increment(1);
}

pub fn record_transition(to: DerivedStatus) {
    counter!(LIVENESS_TRANSITIONS, "to" => to.as_str()).increment(1);
}

pub fn record_storage_failure(op: &'static str) {
    counter!(STORAGE_FAILURES, "op" => op).increment(1);
}

pub fn record_fleet(summary: &FleetSummary) {
    for status in DerivedStatus::ALL {
        let count = match status {
            DerivedStatus::Online => summary.online,
            DerivedStatus::Stale => summary.stale,
            DerivedStatus::Offline => summary.offline,
        };
        gauge!(NODES, "derived_status" => status.as_str()).set(count as f64);
    }
}
