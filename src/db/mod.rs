use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

pub mod nodes;
pub mod history;
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::MeshResult;
use crate::models::{DerivedStatus, HistoryEvent, Node};

/// Persistence collaborator for the core.
///
/// Compound writes (`create_node`, `put_node`, `set_derived_status`) apply the
/// node change and its optional history event as one unit: either both are
/// visible afterwards or neither is.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Insert a new node together with its registration event.
    /// Fails with `DuplicateNode` if the id exists.
    async fn create_node(&self, node: &Node, event: &HistoryEvent) -> MeshResult<()>;

    /// Overwrite an existing node's mutable state. `last_seen` never moves
    /// backwards, even if `node.last_seen` is older than the stored value.
    /// Fails with `UnknownNode` if the id is not registered.
    async fn put_node(&self, node: &Node, event: Option<&HistoryEvent>) -> MeshResult<()>;

    /// Write only the derived status. Returns false if the node is gone.
    async fn set_derived_status(
        &self,
        node_id: &str,
        status: DerivedStatus,
        event: Option<&HistoryEvent>,
    ) -> MeshResult<bool>;

    async fn get_node(&self, node_id: &str) -> MeshResult<Option<Node>>;

    /// All nodes, most recently seen first; never-seen nodes last; ties by id.
    async fn list_nodes(&self) -> MeshResult<Vec<Node>>;

    /// Remove a node record. History is left untouched.
    async fn delete_node(&self, node_id: &str) -> MeshResult<bool>;

    async fn append_event(&self, event: &HistoryEvent) -> MeshResult<()>;

    /// Newest first, at most `limit`.
    async fn list_events(&self, node_id: &str, limit: usize) -> MeshResult<Vec<HistoryEvent>>;
}

pub async fn init_pool(database_url: &str, acquire_timeout: Duration) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        node_id TEXT PRIMARY KEY,
        node_type TEXT NOT NULL,
        location TEXT NOT NULL,
        contact TEXT,
        ip_address TEXT NOT NULL,
        registration_date TIMESTAMPTZ NOT NULL,
        last_seen TIMESTAMPTZ,
        self_reported_status TEXT NOT NULL,
        derived_status TEXT NOT NULL,
        profile JSONB NOT NULL DEFAULT '{}'::jsonb,
        details JSONB NOT NULL DEFAULT '{}'::jsonb
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS node_history (
        seq BIGSERIAL PRIMARY KEY,
        event_id UUID NOT NULL UNIQUE,
        node_id TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        event_type TEXT NOT NULL,
        details TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS node_history_node_ts ON node_history (node_id, timestamp DESC, seq DESC)",
    "CREATE INDEX IF NOT EXISTS nodes_last_seen ON nodes (last_seen DESC NULLS LAST, node_id)",
];

/// Create tables and indexes if missing. Idempotent.
pub async fn init_schema(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
