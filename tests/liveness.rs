mod common;

use chrono::Duration;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{harness, harness_with, new_node, settings, t0, FaultyStore};
use mesh_monitor::db::MemoryStore;
use mesh_monitor::models::{DerivedStatus, EventType, FleetSummary, SelfReportedStatus};
use mesh_monitor::services::Heartbeat;

async fn status_after(elapsed: i64) -> DerivedStatus {
    let h = harness();
    h.monitor.registry.register(new_node("n1"), "x").await.unwrap();
    h.monitor
        .heartbeats
        .process_heartbeat(Heartbeat::new("n1", SelfReportedStatus::Ok).observed_at(t0()))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::seconds(elapsed));
    let nodes = h.monitor.list_with_status().await.unwrap();
    nodes[0].derived_status
}

#[tokio::test]
async fn derived_status_bands() {
    assert_eq!(status_after(200).await, DerivedStatus::Online);
    assert_eq!(status_after(300).await, DerivedStatus::Online);
    assert_eq!(status_after(500).await, DerivedStatus::Stale);
    assert_eq!(status_after(900).await, DerivedStatus::Stale);
    assert_eq!(status_after(1000).await, DerivedStatus::Offline);
}

#[tokio::test]
async fn list_orders_by_recent_activity() {
    let h = harness();
    for id in ["quiet", "early", "late"] {
        h.monitor.registry.register(new_node(id), "x").await.unwrap();
    }
    h.clock.set(t0() + Duration::seconds(30));
    for (id, secs) in [("early", 10), ("late", 20)] {
        h.monitor
            .heartbeats
            .process_heartbeat(Heartbeat::new(id, SelfReportedStatus::Ok).observed_at(t0() + Duration::seconds(secs)))
            .await
            .unwrap();
    }
    let ids: Vec<_> = h
        .monitor
        .list_with_status()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.node_id)
        .collect();
    assert_eq!(ids, vec!["late", "early", "quiet"]);
}

#[tokio::test]
async fn sweep_emits_one_event_per_transition() {
    let h = harness();
    h.monitor.registry.register(new_node("a"), "x").await.unwrap();
    h.monitor.registry.register(new_node("b"), "x").await.unwrap();
    let sweeper = h.monitor.sweeper();

    assert_eq!(sweeper.sweep_once().await.unwrap().transitions, 0);

    h.clock.advance(Duration::seconds(500));
    h.monitor
        .heartbeats
        .process_heartbeat(Heartbeat::new("a", SelfReportedStatus::Ok))
        .await
        .unwrap();
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.transitions, 1);
    assert_eq!(sweeper.sweep_once().await.unwrap().transitions, 0);

    let b = h.monitor.registry.get("b").await.unwrap();
    assert_eq!(b.derived_status, DerivedStatus::Stale);
    let liveness: Vec<_> = h
        .monitor
        .history
        .recent("b", 20)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::LivenessChange)
        .collect();
    assert_eq!(liveness.len(), 1);
    assert_eq!(liveness[0].details, "Liveness changed from online to stale");
    assert_eq!(liveness[0].timestamp, t0() + Duration::seconds(500));

    assert_eq!(
        h.monitor.fleet_summary().await.unwrap(),
        FleetSummary { total: 2, online: 1, stale: 1, offline: 0 }
    );
}

#[tokio::test]
async fn heartbeat_after_sweep_recovers_on_next_pass() {
    let h = harness();
    h.monitor.registry.register(new_node("n1"), "x").await.unwrap();
    let sweeper = h.monitor.sweeper();

    h.clock.advance(Duration::seconds(2_000));
    sweeper.sweep_once().await.unwrap();
    assert_eq!(h.monitor.registry.get("n1").await.unwrap().derived_status, DerivedStatus::Offline);

    h.monitor
        .heartbeats
        .process_heartbeat(Heartbeat::new("n1", SelfReportedStatus::Online))
        .await
        .unwrap();
    // The stored value only moves on a sweep; queries evaluate on the fly.
    assert_eq!(h.monitor.registry.get("n1").await.unwrap().derived_status, DerivedStatus::Offline);
    assert_eq!(
        h.monitor.node_detail("n1").await.unwrap().derived_status,
        DerivedStatus::Online
    );

    assert_eq!(sweeper.sweep_once().await.unwrap().transitions, 1);
    assert_eq!(h.monitor.registry.get("n1").await.unwrap().derived_status, DerivedStatus::Online);
}

async fn maintenance_node_after_long_silence(exempt: bool) -> DerivedStatus {
    let h = harness_with(Arc::new(MemoryStore::new()), settings(exempt));
    h.monitor.registry.register(new_node("n1"), "x").await.unwrap();
    h.monitor
        .heartbeats
        .process_heartbeat(Heartbeat::new("n1", SelfReportedStatus::Maintenance))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(5_000));
    h.monitor.sweeper().sweep_once().await.unwrap();
    h.monitor.registry.get("n1").await.unwrap().derived_status
}

#[tokio::test]
async fn maintenance_exemption_caps_at_stale() {
    assert_eq!(maintenance_node_after_long_silence(true).await, DerivedStatus::Stale);
    assert_eq!(maintenance_node_after_long_silence(false).await, DerivedStatus::Offline);
}

#[tokio::test]
async fn sweep_counts_failures_and_continues() {
    let store = Arc::new(FaultyStore::default());
    let h = harness_with(store.clone(), settings(false));
    h.monitor.registry.register(new_node("a"), "x").await.unwrap();
    h.monitor.registry.register(new_node("b"), "x").await.unwrap();

    store.fail_writes.store(true, Ordering::SeqCst);
    h.clock.advance(Duration::seconds(1_000));
    let report = h.monitor.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.failures, 2);
    assert_eq!(report.transitions, 0);
    // Failed writes still count toward the fleet, at their stored value.
    assert_eq!(report.fleet, FleetSummary { total: 2, online: 2, stale: 0, offline: 0 });

    store.fail_writes.store(false, Ordering::SeqCst);
    let report = h.monitor.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.transitions, 2);
}
