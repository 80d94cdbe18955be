//! Runs against a live PostgreSQL when `DATABASE_URL` is set; each test
//! returns early otherwise. Node ids are unique per run so the suite can
//! share a database with other data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use mesh_monitor::db::{self, NodeStore, PgStore};
use mesh_monitor::models::{Details, DerivedStatus, EventType, HistoryEvent, Node, SelfReportedStatus};
use mesh_monitor::MeshError;

async fn store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = db::init_pool(&url, std::time::Duration::from_secs(5))
        .await
        .expect("connect to DATABASE_URL");
    db::init_schema(&pool).await.expect("create schema");
    Some(PgStore::new(pool))
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
}

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn node(id: &str) -> Node {
    let mut profile = Details::new();
    profile.insert("antenna".into(), json!("omni"));
    Node {
        node_id: id.to_string(),
        node_type: "relay".into(),
        location: "ridge".into(),
        contact: None,
        ip_address: "10.9.0.1".into(),
        registration_date: t0(),
        last_seen: None,
        self_reported_status: SelfReportedStatus::Registered,
        derived_status: DerivedStatus::Online,
        profile,
        details: Details::new(),
    }
}

fn registration(id: &str) -> HistoryEvent {
    HistoryEvent::new(id, t0(), EventType::Registration, "Node registered from 10.9.0.1".into())
}

#[tokio::test]
async fn create_round_trips_and_rejects_duplicates() {
    let Some(store) = store().await else { return };
    let id = unique_id("pg-create");
    store.create_node(&node(&id), &registration(&id)).await.unwrap();

    let stored = store.get_node(&id).await.unwrap().unwrap();
    assert_eq!(stored, node(&id));

    let mut again = node(&id);
    again.location = "elsewhere".into();
    let err = store.create_node(&again, &registration(&id)).await.unwrap_err();
    assert!(matches!(err, MeshError::DuplicateNode(dup) if dup == id));

    assert_eq!(store.get_node(&id).await.unwrap().unwrap().location, "ridge");
    assert_eq!(store.list_events(&id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_event_insert_rolls_back_node() {
    let Some(store) = store().await else { return };
    let first = unique_id("pg-rollback");
    let event = registration(&first);
    store.create_node(&node(&first), &event).await.unwrap();

    // Reusing an event id violates the history table's unique constraint
    // after the node row is already written inside the transaction.
    let second = unique_id("pg-rollback");
    let mut clash = registration(&second);
    clash.event_id = event.event_id;
    assert!(store.create_node(&node(&second), &clash).await.is_err());

    assert!(store.get_node(&second).await.unwrap().is_none());
    assert!(store.list_events(&second, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn put_never_moves_last_seen_backwards() {
    let Some(store) = store().await else { return };
    let id = unique_id("pg-seen");
    store.create_node(&node(&id), &registration(&id)).await.unwrap();

    let mut newer = node(&id);
    newer.last_seen = Some(t0() + Duration::seconds(60));
    newer.self_reported_status = SelfReportedStatus::Ok;
    store.put_node(&newer, None).await.unwrap();

    let mut older = node(&id);
    older.last_seen = Some(t0() + Duration::seconds(10));
    older.self_reported_status = SelfReportedStatus::Warning;
    let event = HistoryEvent::new(&id, t0() + Duration::seconds(70), EventType::StatusChange, "Status changed to warning: No message".into());
    store.put_node(&older, Some(&event)).await.unwrap();

    let stored = store.get_node(&id).await.unwrap().unwrap();
    assert_eq!(stored.last_seen, Some(t0() + Duration::seconds(60)));
    assert_eq!(stored.self_reported_status, SelfReportedStatus::Warning);

    let history = store.list_events(&id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event_type, EventType::StatusChange);
    assert_eq!(history[1].event_type, EventType::Registration);
}

#[tokio::test]
async fn writes_to_unknown_node_leave_no_history() {
    let Some(store) = store().await else { return };
    let id = unique_id("pg-ghost");
    let event = HistoryEvent::new(&id, t0(), EventType::StatusChange, "Status changed to error: No message".into());

    let err = store.put_node(&node(&id), Some(&event)).await.unwrap_err();
    assert!(matches!(err, MeshError::UnknownNode(_)));

    let liveness = HistoryEvent::new(&id, t0(), EventType::LivenessChange, "Liveness changed from online to offline".into());
    assert!(!store
        .set_derived_status(&id, DerivedStatus::Offline, Some(&liveness))
        .await
        .unwrap());

    assert!(store.get_node(&id).await.unwrap().is_none());
    assert!(store.list_events(&id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn derived_status_write_and_delete_keep_history() {
    let Some(store) = store().await else { return };
    let id = unique_id("pg-sweep");
    store.create_node(&node(&id), &registration(&id)).await.unwrap();

    let event = HistoryEvent::new(&id, t0() + Duration::seconds(1_000), EventType::LivenessChange, "Liveness changed from online to offline".into());
    assert!(store.set_derived_status(&id, DerivedStatus::Offline, Some(&event)).await.unwrap());
    assert_eq!(store.get_node(&id).await.unwrap().unwrap().derived_status, DerivedStatus::Offline);

    let history = store.list_events(&id, 10).await.unwrap();
    assert_eq!(history[0], event);
    assert_eq!(store.list_events(&id, 1).await.unwrap().len(), 1);

    assert!(store.delete_node(&id).await.unwrap());
    assert!(!store.delete_node(&id).await.unwrap());
    assert!(store.get_node(&id).await.unwrap().is_none());
    assert_eq!(store.list_events(&id, 10).await.unwrap().len(), 2);
}
