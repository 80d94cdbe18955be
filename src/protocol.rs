use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::{ErrorKind, MeshError};
use crate::handlers::{self, HeartbeatRequest, RegisterNodeRequest};
use crate::models::{FleetSummary, HistoryEvent, Node, NodeDetail, NodeMetadataUpdate, NodeSummary};
use crate::services::{MeshMonitor, SweepReport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNodeRequest {
    pub node_id: String,
    #[serde(flatten)]
    pub update: NodeMetadataUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshRequest {
    /// `origin` is the transport-observed address of the caller.
    Register { request: RegisterNodeRequest, origin: String },
    Heartbeat(HeartbeatRequest),
    ListNodes,
    NodeDetail { node_id: String },
    History { node_id: String, limit: Option<usize> },
    UpdateNode(UpdateNodeRequest),
    Deregister { node_id: String },
    FleetSummary,
    Sweep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshResponse {
    Registered { node: Node },
    HeartbeatAccepted { node: Node, event: Option<HistoryEvent> },
    Nodes { nodes: Vec<NodeSummary> },
    NodeDetail(NodeDetail),
    History { events: Vec<HistoryEvent> },
    Updated { node: Node },
    Deregistered { node_id: String },
    FleetSummary(FleetSummary),
    Swept(SweepReport),
    Error { kind: ErrorKind, message: String },
}

impl From<MeshError> for MeshResponse {
    fn from(e: MeshError) -> Self {
        MeshResponse::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Transport-agnostic entry point: any listener can hand decoded requests
/// here and encode the response it gets back.
#[derive(Clone)]
pub struct MeshService {
    monitor: Arc<MeshMonitor>,
}

impl MeshService {
    pub fn new(monitor: Arc<MeshMonitor>) -> Self {
        Self { monitor }
    }

    pub fn monitor(&self) -> &MeshMonitor {
        &self.monitor
    }

    pub async fn handle_request(&self, request: MeshRequest) -> MeshResponse {
        let monitor = self.monitor.as_ref();
        let result = match request {
            MeshRequest::Register { request, origin } => handlers::handle_register(monitor, request, &origin)
                .await
                .map(|node| MeshResponse::Registered { node }),
            MeshRequest::Heartbeat(req) => handlers::handle_heartbeat(monitor, req)
                .await
                .map(|out| MeshResponse::HeartbeatAccepted {
                    node: out.node,
                    event: out.event,
                }),
            MeshRequest::ListNodes => handlers::handle_list_nodes(monitor)
                .await
                .map(|nodes| MeshResponse::Nodes { nodes }),
            MeshRequest::NodeDetail { node_id } => handlers::handle_node_detail(monitor, &node_id)
                .await
                .map(MeshResponse::NodeDetail),
            MeshRequest::History { node_id, limit } => handlers::handle_history(monitor, &node_id, limit)
                .await
                .map(|events| MeshResponse::History { events }),
            MeshRequest::UpdateNode(req) => handlers::handle_update_node(monitor, &req.node_id, req.update)
                .await
                .map(|node| MeshResponse::Updated { node }),
            MeshRequest::Deregister { node_id } => handlers::handle_deregister(monitor, &node_id)
                .await
                .map(|()| MeshResponse::Deregistered { node_id }),
            MeshRequest::FleetSummary => handlers::handle_fleet_summary(monitor)
                .await
                .map(MeshResponse::FleetSummary),
            MeshRequest::Sweep => handlers::handle_sweep(monitor).await.map(MeshResponse::Swept),
        };
        result.unwrap_or_else(MeshResponse::from)
    }

    /// JSON in, JSON out. Malformed requests come back as `invalid_input`.
    pub async fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<MeshRequest>(raw) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => MeshError::InvalidInput(format!("malformed request: {}", e)).into(),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| encoding_failure(&e))
    }
}

fn encoding_failure(err: &dyn std::fmt::Display) -> String {
    json!({
        "type": "error",
        "kind": ErrorKind::StorageUnavailable,
        "message": format!("response encoding failed: {}", err),
    })
    .to_string()
}
