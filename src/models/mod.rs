use serde::{Serialize, Deserialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

pub mod node;
pub mod history;

pub use node::{Details, DerivedStatus, Node, NodeMetadataUpdate, SelfReportedStatus};
pub use history::{EventType, HistoryEvent};

use crate::error::MeshError;

#[derive(sqlx::FromRow)]
pub struct NodeRow {
    pub node_id: String,
    pub node_type: String,
    pub location: String,
    pub contact: Option<String>,
    pub ip_address: String,
    pub registration_date: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub self_reported_status: String,
    pub derived_status: String,
    pub profile: Json<Details>,
    pub details: Json<Details>,
}

impl TryFrom<NodeRow> for Node {
    type Error = MeshError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let corrupt = |e: MeshError| {
            MeshError::StorageUnavailable(format!("corrupt node row '{}': {}", row.node_id, e))
        };
        let self_reported_status = row.self_reported_status.parse().map_err(corrupt)?;
        let derived_status = row.derived_status.parse().map_err(corrupt)?;
        Ok(Node {
            node_id: row.node_id,
            node_type: row.node_type,
            location: row.location,
            contact: row.contact,
            ip_address: row.ip_address,
            registration_date: row.registration_date,
            last_seen: row.last_seen,
            self_reported_status,
            derived_status,
            profile: row.profile.0,
            details: row.details.0,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct HistoryRow {
    pub event_id: Uuid,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub details: String,
}

impl TryFrom<HistoryRow> for HistoryEvent {
    type Error = MeshError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let event_type = row.event_type.parse().map_err(|e: MeshError| {
            MeshError::StorageUnavailable(format!("corrupt history row '{}': {}", row.event_id, e))
        })?;
        Ok(HistoryEvent {
            event_id: row.event_id,
            node_id: row.node_id,
            timestamp: row.timestamp,
            event_type,
            details: row.details,
        })
    }
}

/// List-view entry with liveness evaluated at query time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeSummary {
    pub node_id: String,
    pub node_type: String,
    pub location: String,
    pub ip_address: String,
    pub registration_date: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub self_reported_status: SelfReportedStatus,
    pub derived_status: DerivedStatus,
}

impl NodeSummary {
    pub fn from_node(node: &Node, derived_status: DerivedStatus) -> Self {
        Self {
            node_id: node.node_id.clone(),
            node_type: node.node_type.clone(),
            location: node.location.clone(),
            ip_address: node.ip_address.clone(),
            registration_date: node.registration_date,
            last_seen: node.last_seen,
            self_reported_status: node.self_reported_status,
            derived_status,
        }
    }
}

/// Single-node view: the record, its current liveness and recent history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeDetail {
    pub node: Node,
    pub derived_status: DerivedStatus,
    pub history: Vec<HistoryEvent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub total: usize,
    pub online: usize,
    pub stale: usize,
    pub offline: usize,
}

impl FleetSummary {
    pub fn record(&mut self, status: DerivedStatus) {
        self.total += 1;
        match status {
            DerivedStatus::Online => self.online += 1,
            DerivedStatus::Stale => self.stale += 1,
            DerivedStatus::Offline => self.offline += 1,
        }
    }
}
