use log::{info, warn};

use super::CoreContext;
use crate::error::{MeshError, MeshResult};
use crate::metrics;
use crate::models::{
    Details, DerivedStatus, EventType, HistoryEvent, Node, NodeMetadataUpdate, SelfReportedStatus,
};

/// Registration payload after boundary parsing.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub node_id: String,
    pub node_type: String,
    pub location: String,
    pub ip_address: String,
    pub contact: Option<String>,
    pub details: Details,
}

/// Owns node identity and descriptive metadata.
pub struct NodeRegistry {
    ctx: CoreContext,
}

impl NodeRegistry {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Create a node and its `registration` event in one write.
    /// `origin` is the caller-observed network address of the registrant.
    pub async fn register(&self, new: NewNode, origin: &str) -> MeshResult<Node> {
        let node_id = required("node_id", &new.node_id)?;
        let node_type = required("node_type", &new.node_type)?;
        let location = required("location", &new.location)?;
        let ip_address = required("ip_address", &new.ip_address)?;

        let _guard = self.ctx.locks.lock(&node_id).await;
        let now = self.ctx.clock.now();
        let node = Node {
            node_id: node_id.clone(),
            node_type,
            location,
            contact: new.contact.filter(|c| !c.trim().is_empty()),
            ip_address,
            registration_date: now,
            last_seen: None,
            self_reported_status: SelfReportedStatus::Registered,
            derived_status: DerivedStatus::Online,
            profile: Details::new(),
            details: new.details,
        };
        let event = HistoryEvent::new(
            &node_id,
            now,
            EventType::Registration,
            format!("Node registered from {}", origin),
        );

        match self.ctx.storage("create_node", self.ctx.store.create_node(&node, &event)).await {
            Ok(()) => {}
            Err(MeshError::DuplicateNode(id)) => {
                warn!("Rejected duplicate registration for node {} from {}", id, origin);
                return Err(MeshError::DuplicateNode(id));
            }
            Err(e) => return Err(e),
        }

        metrics::record_registration();
        metrics::record_event(EventType::Registration);
        info!("New node registered: {} ({}) from {}", node.node_id, node.node_type, origin);
        Ok(node)
    }

    pub async fn get(&self, node_id: &str) -> MeshResult<Node> {
        self.ctx
            .storage("get_node", self.ctx.store.get_node(node_id))
            .await?
            .ok_or_else(|| MeshError::NotFound(node_id.to_string()))
    }

    /// Most recently active first; never-seen nodes last; ties by id.
    pub async fn list(&self) -> MeshResult<Vec<Node>> {
        self.ctx.storage("list_nodes", self.ctx.store.list_nodes()).await
    }

    /// Administrative metadata change. Writes no history.
    pub async fn update_metadata(&self, node_id: &str, update: NodeMetadataUpdate) -> MeshResult<Node> {
        let node_type = update.node_type.as_deref().map(|v| required("node_type", v)).transpose()?;
        let location = update.location.as_deref().map(|v| required("location", v)).transpose()?;
        let ip_address = update.ip_address.as_deref().map(|v| required("ip_address", v)).transpose()?;

        let _guard = self.ctx.locks.lock(node_id).await;
        let mut node = self
            .ctx
            .storage("get_node", self.ctx.store.get_node(node_id))
            .await?
            .ok_or_else(|| MeshError::NotFound(node_id.to_string()))?;

        if let Some(v) = node_type {
            node.node_type = v;
        }
        if let Some(v) = location {
            node.location = v;
        }
        if let Some(v) = ip_address {
            node.ip_address = v;
        }
        if let Some(contact) = update.contact {
            let contact = contact.trim().to_string();
            node.contact = (!contact.is_empty()).then_some(contact);
        }
        if let Some(profile) = update.profile {
            node.profile = profile;
        }

        match self.ctx.storage("put_node", self.ctx.store.put_node(&node, None)).await {
            Ok(()) => {}
            // Deleted between read and write.
            Err(MeshError::UnknownNode(id)) => return Err(MeshError::NotFound(id)),
            Err(e) => return Err(e),
        }
        info!("Updated metadata for node {}", node_id);
        Ok(node)
    }

    /// Remove a node record. Its history stays.
    pub async fn deregister(&self, node_id: &str) -> MeshResult<bool> {
        let _guard = self.ctx.locks.lock(node_id).await;
        let removed = self
            .ctx
            .storage("delete_node", self.ctx.store.delete_node(node_id))
            .await?;
        if removed {
            info!("Deregistered node {}", node_id);
        } else {
            warn!("Node not found for deregistration: {}", node_id);
        }
        Ok(removed)
    }
}

fn required(field: &str, value: &str) -> MeshResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MeshError::InvalidInput(format!("Missing required field: {}", field)));
    }
    Ok(trimmed.to_string())
}
