use async_trait::async_trait;
use log::debug;
use sqlx::{Pool, Postgres};

use super::{history, nodes, NodeStore};
use crate::error::{MeshError, MeshResult};
use crate::models::{DerivedStatus, HistoryEvent, Node};

/// PostgreSQL-backed store. Each compound write is one transaction; if any
/// statement fails, or the future is dropped on timeout, the transaction
/// rolls back.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl NodeStore for PgStore {
    async fn create_node(&self, node: &Node, event: &HistoryEvent) -> MeshResult<()> {
        let mut tx = self.pool.begin().await?;
        if !nodes::insert_node_tx(&mut tx, node).await? {
            tx.rollback().await?;
            return Err(MeshError::DuplicateNode(node.node_id.clone()));
        }
        history::insert_event_tx(&mut tx, event).await?;
        tx.commit().await?;
        debug!("Inserted node {} with registration event {}", node.node_id, event.event_id);
        Ok(())
    }

    async fn put_node(&self, node: &Node, event: Option<&HistoryEvent>) -> MeshResult<()> {
        let mut tx = self.pool.begin().await?;
        if !nodes::update_node_tx(&mut tx, node).await? {
            tx.rollback().await?;
            return Err(MeshError::UnknownNode(node.node_id.clone()));
        }
        if let Some(event) = event {
            history::insert_event_tx(&mut tx, event).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_derived_status(
        &self,
        node_id: &str,
        status: DerivedStatus,
        event: Option<&HistoryEvent>,
    ) -> MeshResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !nodes::set_derived_status_tx(&mut tx, node_id, status).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        if let Some(event) = event {
            history::insert_event_tx(&mut tx, event).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn get_node(&self, node_id: &str) -> MeshResult<Option<Node>> {
        nodes::get_node(&self.pool, node_id).await
    }

    async fn list_nodes(&self) -> MeshResult<Vec<Node>> {
        nodes::list_nodes(&self.pool).await
    }

    async fn delete_node(&self, node_id: &str) -> MeshResult<bool> {
        Ok(nodes::delete_node(&self.pool, node_id).await?)
    }

    async fn append_event(&self, event: &HistoryEvent) -> MeshResult<()> {
        Ok(history::insert_event(&self.pool, event).await?)
    }

    async fn list_events(&self, node_id: &str, limit: usize) -> MeshResult<Vec<HistoryEvent>> {
        history::recent_events(&self.pool, node_id, limit).await
    }
}
