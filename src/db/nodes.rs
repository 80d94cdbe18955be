use sqlx::{Pool, Postgres, Transaction};
use sqlx::types::Json;

use crate::error::MeshResult;
use crate::models::{DerivedStatus, Node, NodeRow};

const NODE_COLUMNS: &str = "node_id, node_type, location, contact, ip_address, registration_date, \
                            last_seen, self_reported_status, derived_status, profile, details";

/// Returns false if a node with the same id already exists.
pub async fn insert_node_tx(tx: &mut Transaction<'_, Postgres>, node: &Node) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        INSERT INTO nodes
            (node_id, node_type, location, contact, ip_address, registration_date,
             last_seen, self_reported_status, derived_status, profile, details)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (node_id) DO NOTHING
        "#,
    )
        .bind(&node.node_id)
        .bind(&node.node_type)
        .bind(&node.location)
        .bind(&node.contact)
        .bind(&node.ip_address)
        .bind(node.registration_date)
        .bind(node.last_seen)
        .bind(node.self_reported_status.as_str())
        .bind(node.derived_status.as_str())
        .bind(Json(&node.profile))
        .bind(Json(&node.details))
        .execute(&mut **tx)
        .await?
        .rows_affected();
    Ok(rows == 1)
}

/// Updates everything except identity, registration date and derived status.
/// `last_seen` is only ever moved forward.
pub async fn update_node_tx(tx: &mut Transaction<'_, Postgres>, node: &Node) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        UPDATE nodes
        SET node_type = $2,
            location = $3,
            contact = $4,
            ip_address = $5,
            last_seen = GREATEST(last_seen, $6),
            self_reported_status = $7,
            profile = $8,
            details = $9
        WHERE node_id = $1
        "#,
    )
        .bind(&node.node_id)
        .bind(&node.node_type)
        .bind(&node.location)
        .bind(&node.contact)
        .bind(&node.ip_address)
        .bind(node.last_seen)
        .bind(node.self_reported_status.as_str())
        .bind(Json(&node.profile))
        .bind(Json(&node.details))
        .execute(&mut **tx)
        .await?
        .rows_affected();
    Ok(rows == 1)
}

pub async fn set_derived_status_tx(
    tx: &mut Transaction<'_, Postgres>,
    node_id: &str,
    status: DerivedStatus,
) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query("UPDATE nodes SET derived_status = $2 WHERE node_id = $1")
        .bind(node_id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?
        .rows_affected();
    Ok(rows == 1)
}

pub async fn get_node(pool: &Pool<Postgres>, node_id: &str) -> MeshResult<Option<Node>> {
    let row = sqlx::query_as::<_, NodeRow>(&format!("SELECT {} FROM nodes WHERE node_id = $1", NODE_COLUMNS))
        .bind(node_id)
        .fetch_optional(pool)
        .await?;
    row.map(Node::try_from).transpose()
}

pub async fn list_nodes(pool: &Pool<Postgres>) -> MeshResult<Vec<Node>> {
    let rows = sqlx::query_as::<_, NodeRow>(&format!(
        "SELECT {} FROM nodes ORDER BY last_seen DESC NULLS LAST, node_id ASC",
        NODE_COLUMNS
    ))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(Node::try_from).collect()
}

pub async fn delete_node(pool: &Pool<Postgres>, node_id: &str) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query("DELETE FROM nodes WHERE node_id = $1")
        .bind(node_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows > 0)
}
