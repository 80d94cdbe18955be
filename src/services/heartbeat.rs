use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::CoreContext;
use crate::error::{MeshError, MeshResult};
use crate::metrics;
use crate::models::{Details, EventType, HistoryEvent, Node, SelfReportedStatus};

/// Heartbeat after boundary parsing.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub node_id: String,
    pub status: SelfReportedStatus,
    /// Replaces the node's details wholesale when present.
    pub details: Option<Details>,
    pub message: Option<String>,
    /// Defaults to the clock's now.
    pub observed_at: Option<DateTime<Utc>>,
}

impl Heartbeat {
    pub fn new(node_id: impl Into<String>, status: SelfReportedStatus) -> Self {
        Self {
            node_id: node_id.into(),
            status,
            details: None,
            message: None,
            observed_at: None,
        }
    }

    pub fn observed_at(mut self, t: DateTime<Utc>) -> Self {
        self.observed_at = Some(t);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatOutcome {
    pub node: Node,
    /// The `status_change` event written, if the status was significant.
    pub event: Option<HistoryEvent>,
}

/// Applies heartbeats to node state. Never touches derived status and never
/// creates nodes.
pub struct HeartbeatProcessor {
    ctx: CoreContext,
}

impl HeartbeatProcessor {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    pub async fn process_heartbeat(&self, heartbeat: Heartbeat) -> MeshResult<HeartbeatOutcome> {
        let Heartbeat {
            node_id,
            status,
            details,
            message,
            observed_at,
        } = heartbeat;

        let _guard = self.ctx.locks.lock(&node_id).await;
        let Some(mut node) = self
            .ctx
            .storage("get_node", self.ctx.store.get_node(&node_id))
            .await?
        else {
            warn!("Heartbeat from unregistered node {}: check fleet configuration", node_id);
            metrics::record_unknown_node();
            return Err(MeshError::UnknownNode(node_id));
        };

        let now = self.ctx.clock.now();
        // A future-dated report must not keep a silent node looking alive.
        let observed_at = match observed_at {
            Some(t) if t > now => {
                warn!("Heartbeat for {} dated {} is ahead of local time {}, clamping", node_id, t, now);
                now
            }
            Some(t) => t,
            None => now,
        };
        if node.last_seen.is_some_and(|seen| observed_at < seen) {
            debug!("Out-of-order heartbeat for {} at {}, keeping last_seen", node_id, observed_at);
        }
        node.last_seen = node.last_seen.max(Some(observed_at));
        node.self_reported_status = status;
        if let Some(details) = details {
            node.details = details;
        }

        let event = status.is_significant().then(|| {
            HistoryEvent::new(
                &node_id,
                now,
                EventType::StatusChange,
                format!(
                    "Status changed to {}: {}",
                    status,
                    message.as_deref().unwrap_or("No message")
                ),
            )
        });

        self.ctx
            .storage("put_node", self.ctx.store.put_node(&node, event.as_ref()))
            .await?;

        metrics::record_heartbeat(status);
        if let Some(event) = &event {
            metrics::record_event(event.event_type);
            info!("Node {} reported {}", node_id, status);
        }
        Ok(HeartbeatOutcome { node, event })
    }
}
