use sqlx::{Pool, Postgres, Transaction};

use crate::error::MeshResult;
use crate::models::{HistoryEvent, HistoryRow};

pub async fn insert_event_tx(tx: &mut Transaction<'_, Postgres>, event: &HistoryEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO node_history (event_id, node_id, timestamp, event_type, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
        .bind(event.event_id)
        .bind(&event.node_id)
        .bind(event.timestamp)
        .bind(event.event_type.as_str())
        .bind(&event.details)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_event(pool: &Pool<Postgres>, event: &HistoryEvent) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    insert_event_tx(&mut tx, event).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn recent_events(pool: &Pool<Postgres>, node_id: &str, limit: usize) -> MeshResult<Vec<HistoryEvent>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT event_id, node_id, timestamp, event_type, details
        FROM node_history
        WHERE node_id = $1
        ORDER BY timestamp DESC, seq DESC
        LIMIT $2
        "#,
    )
        .bind(node_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(HistoryEvent::try_from).collect()
}
