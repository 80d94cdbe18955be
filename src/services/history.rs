use super::CoreContext;
use crate::error::MeshResult;
use crate::metrics;
use crate::models::HistoryEvent;

/// Append-only per-node event log.
pub struct HistoryLog {
    ctx: CoreContext,
}

impl HistoryLog {
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Timestamps are taken as given; ordering is not re-validated.
    pub async fn append(&self, event: HistoryEvent) -> MeshResult<()> {
        self.ctx
            .storage("append_event", self.ctx.store.append_event(&event))
            .await?;
        metrics::record_event(event.event_type);
        Ok(())
    }

    /// Newest first, at most `limit`. Empty for nodes without events.
    pub async fn recent(&self, node_id: &str, limit: usize) -> MeshResult<Vec<HistoryEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.ctx
            .storage("list_events", self.ctx.store.list_events(node_id, limit))
            .await
    }
}
