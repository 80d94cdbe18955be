//! Ingest and query boundary.
//!
//! Wire-shaped requests are parsed here into the typed inputs the core
//! accepts. Status strings, required fields and the loose heartbeat metrics
//! are all validated before anything reaches the registry.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MeshError, MeshResult};
use crate::models::{
    Details, FleetSummary, HistoryEvent, Node, NodeDetail, NodeMetadataUpdate, NodeSummary,
    SelfReportedStatus,
};
use crate::services::{Heartbeat, HeartbeatOutcome, MeshMonitor, NewNode, SweepReport};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterNodeRequest {
    pub node_id: String,
    pub node_type: String,
    pub location: String,
    pub ip_address: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub details: Option<Details>,
}

impl From<RegisterNodeRequest> for NewNode {
    fn from(req: RegisterNodeRequest) -> Self {
        NewNode {
            node_id: req.node_id,
            node_type: req.node_type,
            location: req.location,
            ip_address: req.ip_address,
            contact: req.contact,
            details: req.details.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub bandwidth: Option<Value>,
    #[serde(default)]
    pub uptime: Option<Value>,
    #[serde(default)]
    pub battery: Option<Value>,
    #[serde(default)]
    pub details: Option<Details>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<HeartbeatRequest> for Heartbeat {
    type Error = MeshError;

    /// Bandwidth, uptime and battery are folded into `details`, overriding
    /// same-named keys. A heartbeat carrying none of them and no details
    /// leaves the node's details alone.
    fn try_from(req: HeartbeatRequest) -> MeshResult<Self> {
        if req.node_id.trim().is_empty() {
            return Err(MeshError::InvalidInput("Missing required field: node_id".into()));
        }
        let status: SelfReportedStatus = req
            .status
            .as_deref()
            .ok_or_else(|| MeshError::InvalidInput("Missing required field: status".into()))?
            .parse()?;
        if status == SelfReportedStatus::Registered {
            return Err(MeshError::InvalidInput(
                "Status 'registered' is assigned at registration, not reported".into(),
            ));
        }

        let metrics = [
            ("bandwidth", req.bandwidth),
            ("uptime", req.uptime),
            ("battery", req.battery),
        ];
        let mut details = req.details;
        for (key, value) in metrics {
            if let Some(value) = value.filter(|v| !v.is_null()) {
                details.get_or_insert_with(Details::new).insert(key.to_string(), value);
            }
        }

        Ok(Heartbeat {
            node_id: req.node_id.trim().to_string(),
            status,
            details,
            message: req.message.filter(|m| !m.trim().is_empty()),
            observed_at: req.timestamp,
        })
    }
}

pub async fn handle_register(
    monitor: &MeshMonitor,
    req: RegisterNodeRequest,
    origin: &str,
) -> MeshResult<Node> {
    monitor.registry.register(req.into(), origin).await
}

pub async fn handle_heartbeat(monitor: &MeshMonitor, req: HeartbeatRequest) -> MeshResult<HeartbeatOutcome> {
    let heartbeat = Heartbeat::try_from(req)?;
    debug!("Heartbeat from {} ({})", heartbeat.node_id, heartbeat.status);
    monitor.heartbeats.process_heartbeat(heartbeat).await
}

pub async fn handle_list_nodes(monitor: &MeshMonitor) -> MeshResult<Vec<NodeSummary>> {
    monitor.list_with_status().await
}

pub async fn handle_node_detail(monitor: &MeshMonitor, node_id: &str) -> MeshResult<NodeDetail> {
    monitor.node_detail(node_id).await
}

/// `limit` defaults to the configured history bound.
pub async fn handle_history(
    monitor: &MeshMonitor,
    node_id: &str,
    limit: Option<usize>,
) -> MeshResult<Vec<HistoryEvent>> {
    let limit = limit.unwrap_or_else(|| monitor.history_limit());
    monitor.history.recent(node_id, limit).await
}

pub async fn handle_update_node(
    monitor: &MeshMonitor,
    node_id: &str,
    update: NodeMetadataUpdate,
) -> MeshResult<Node> {
    monitor.registry.update_metadata(node_id, update).await
}

pub async fn handle_deregister(monitor: &MeshMonitor, node_id: &str) -> MeshResult<()> {
    if monitor.registry.deregister(node_id).await? {
        Ok(())
    } else {
        Err(MeshError::NotFound(node_id.to_string()))
    }
}

pub async fn handle_fleet_summary(monitor: &MeshMonitor) -> MeshResult<FleetSummary> {
    monitor.fleet_summary().await
}

pub async fn handle_sweep(monitor: &MeshMonitor) -> MeshResult<SweepReport> {
    monitor.sweeper().sweep_once().await
}
