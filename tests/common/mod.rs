#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mesh_monitor::db::{MemoryStore, NodeStore};
use mesh_monitor::handlers::RegisterNodeRequest;
use mesh_monitor::models::{DerivedStatus, HistoryEvent, Node};
use mesh_monitor::services::{LivenessPolicy, LivenessThresholds, MeshMonitor, MonitorSettings, NewNode};
use mesh_monitor::{ManualClock, MeshError, MeshResult};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
}

pub fn settings(maintenance_exempt: bool) -> MonitorSettings {
    MonitorSettings {
        thresholds: LivenessThresholds::from_secs(300, 900).unwrap(),
        policy: LivenessPolicy { maintenance_exempt },
        storage_timeout: Duration::from_millis(200),
        history_limit: 20,
    }
}

pub struct Harness {
    pub monitor: Arc<MeshMonitor>,
    pub store: Arc<dyn NodeStore>,
    pub clock: Arc<ManualClock>,
}

pub fn harness_with(store: Arc<dyn NodeStore>, settings: MonitorSettings) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let monitor = Arc::new(MeshMonitor::new(store.clone(), clock.clone(), settings));
    Harness { monitor, store, clock }
}

pub fn harness() -> Harness {
    harness_with(Arc::new(MemoryStore::new()), settings(false))
}

pub fn new_node(id: &str) -> NewNode {
    NewNode {
        node_id: id.to_string(),
        node_type: "relay".to_string(),
        location: "ridge".to_string(),
        ip_address: "10.9.0.1".to_string(),
        ..Default::default()
    }
}

pub fn register_request(id: &str) -> RegisterNodeRequest {
    RegisterNodeRequest {
        node_id: id.to_string(),
        node_type: "gateway".to_string(),
        location: "tower".to_string(),
        ip_address: "10.9.0.2".to_string(),
        ..Default::default()
    }
}

/// Delegates to an in-memory store until `fail_writes` or `stall` is set.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_writes: AtomicBool,
    pub stall: AtomicBool,
}

impl FaultyStore {
    async fn write_gate(&self) -> MeshResult<()> {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MeshError::StorageUnavailable("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeStore for FaultyStore {
    async fn create_node(&self, node: &Node, event: &HistoryEvent) -> MeshResult<()> {
        self.write_gate().await?;
        self.inner.create_node(node, event).await
    }

    async fn put_node(&self, node: &Node, event: Option<&HistoryEvent>) -> MeshResult<()> {
        self.write_gate().await?;
        self.inner.put_node(node, event).await
    }

    async fn set_derived_status(
        &self,
        node_id: &str,
        status: DerivedStatus,
        event: Option<&HistoryEvent>,
    ) -> MeshResult<bool> {
        self.write_gate().await?;
        self.inner.set_derived_status(node_id, status, event).await
    }

    async fn get_node(&self, node_id: &str) -> MeshResult<Option<Node>> {
        self.inner.get_node(node_id).await
    }

    async fn list_nodes(&self) -> MeshResult<Vec<Node>> {
        self.inner.list_nodes().await
    }

    async fn delete_node(&self, node_id: &str) -> MeshResult<bool> {
        self.write_gate().await?;
        self.inner.delete_node(node_id).await
    }

    async fn append_event(&self, event: &HistoryEvent) -> MeshResult<()> {
        self.write_gate().await?;
        self.inner.append_event(event).await
    }

    async fn list_events(&self, node_id: &str, limit: usize) -> MeshResult<Vec<HistoryEvent>> {
        self.inner.list_events(node_id, limit).await
    }
}
