use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::NodeStore;
use crate::error::{MeshError, MeshResult};
use crate::models::{DerivedStatus, HistoryEvent, Node};

/// Node record and its history live in the same slot so a compound write is
/// applied under one shard lock. A deregistered node leaves its history behind.
#[derive(Default)]
struct Slot {
    node: Option<Node>,
    events: Vec<HistoryEvent>,
}

/// In-process store backed by a sharded map.
#[derive(Default)]
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn create_node(&self, node: &Node, event: &HistoryEvent) -> MeshResult<()> {
        match self.slots.entry(node.node_id.clone()) {
            Entry::Occupied(mut slot) => {
                let slot = slot.get_mut();
                if slot.node.is_some() {
                    return Err(MeshError::DuplicateNode(node.node_id.clone()));
                }
                slot.node = Some(node.clone());
                slot.events.push(event.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    node: Some(node.clone()),
                    events: vec![event.clone()],
                });
            }
        }
        Ok(())
    }

    async fn put_node(&self, node: &Node, event: Option<&HistoryEvent>) -> MeshResult<()> {
        let mut slot = self
            .slots
            .get_mut(&node.node_id)
            .ok_or_else(|| MeshError::UnknownNode(node.node_id.clone()))?;
        let slot = slot.value_mut();
        let stored = slot
            .node
            .as_mut()
            .ok_or_else(|| MeshError::UnknownNode(node.node_id.clone()))?;

        let last_seen = stored.last_seen.max(node.last_seen);
        let derived_status = stored.derived_status;
        let registration_date = stored.registration_date;
        *stored = node.clone();
        stored.last_seen = last_seen;
        stored.derived_status = derived_status;
        stored.registration_date = registration_date;

        if let Some(event) = event {
            slot.events.push(event.clone());
        }
        Ok(())
    }

    async fn set_derived_status(
        &self,
        node_id: &str,
        status: DerivedStatus,
        event: Option<&HistoryEvent>,
    ) -> MeshResult<bool> {
        let Some(mut slot) = self.slots.get_mut(node_id) else {
            return Ok(false);
        };
        let slot = slot.value_mut();
        let Some(stored) = slot.node.as_mut() else {
            return Ok(false);
        };
        stored.derived_status = status;
        if let Some(event) = event {
            slot.events.push(event.clone());
        }
        Ok(true)
    }

    async fn get_node(&self, node_id: &str) -> MeshResult<Option<Node>> {
        Ok(self.slots.get(node_id).and_then(|slot| slot.node.clone()))
    }

    async fn list_nodes(&self) -> MeshResult<Vec<Node>> {
        let mut nodes: Vec<Node> = self
            .slots
            .iter()
            .filter_map(|slot| slot.node.clone())
            .collect();
        // None sorts below Some, so reversing the last_seen comparison puts
        // never-seen nodes last.
        nodes.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        Ok(nodes)
    }

    async fn delete_node(&self, node_id: &str) -> MeshResult<bool> {
        Ok(self
            .slots
            .get_mut(node_id)
            .and_then(|mut slot| slot.node.take())
            .is_some())
    }

    async fn append_event(&self, event: &HistoryEvent) -> MeshResult<()> {
        self.slots
            .entry(event.node_id.clone())
            .or_default()
            .events
            .push(event.clone());
        Ok(())
    }

    async fn list_events(&self, node_id: &str, limit: usize) -> MeshResult<Vec<HistoryEvent>> {
        let Some(slot) = self.slots.get(node_id) else {
            return Ok(Vec::new());
        };
        let mut events: Vec<HistoryEvent> = slot.events.iter().rev().cloned().collect();
        // Stable: equal timestamps keep newest-appended first.
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, SelfReportedStatus};
    use chrono::{Duration, TimeZone, Utc};

    fn node(id: &str, last_seen_offset: Option<i64>) -> Node {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Node {
            node_id: id.to_string(),
            node_type: "relay".to_string(),
            location: "roof".to_string(),
            contact: None,
            ip_address: "10.0.0.2".to_string(),
            registration_date: t0,
            last_seen: last_seen_offset.map(|s| t0 + Duration::seconds(s)),
            self_reported_status: SelfReportedStatus::Registered,
            derived_status: DerivedStatus::Online,
            profile: Default::default(),
            details: Default::default(),
        }
    }

    fn registration(id: &str) -> HistoryEvent {
        HistoryEvent::new(id, Utc::now(), EventType::Registration, "Node registered from test".into())
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let store = MemoryStore::new();
        store.create_node(&node("a", None), &registration("a")).await.unwrap();
        let err = store.create_node(&node("a", None), &registration("a")).await.unwrap_err();
        assert!(matches!(err, MeshError::DuplicateNode(id) if id == "a"));
        assert_eq!(store.list_events("a", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_never_regresses_last_seen() {
        let store = MemoryStore::new();
        store.create_node(&node("a", Some(50)), &registration("a")).await.unwrap();
        store.put_node(&node("a", Some(10)), None).await.unwrap();
        let stored = store.get_node("a").await.unwrap().unwrap();
        assert_eq!(stored.last_seen, node("a", Some(50)).last_seen);
    }

    #[tokio::test]
    async fn test_put_keeps_derived_status() {
        let store = MemoryStore::new();
        store.create_node(&node("a", None), &registration("a")).await.unwrap();
        store.set_derived_status("a", DerivedStatus::Offline, None).await.unwrap();
        store.put_node(&node("a", Some(1)), None).await.unwrap();
        let stored = store.get_node("a").await.unwrap().unwrap();
        assert_eq!(stored.derived_status, DerivedStatus::Offline);
    }

    #[tokio::test]
    async fn test_list_orders_by_last_seen_then_id() {
        let store = MemoryStore::new();
        for (id, seen) in [("c", Some(5)), ("b", Some(5)), ("z", None), ("a", Some(1)), ("y", Some(9))] {
            store.create_node(&node(id, seen), &registration(id)).await.unwrap();
        }
        let ids: Vec<_> = store.list_nodes().await.unwrap().into_iter().map(|n| n.node_id).collect();
        assert_eq!(ids, vec!["y", "b", "c", "a", "z"]);
    }

    #[tokio::test]
    async fn test_delete_keeps_history() {
        let store = MemoryStore::new();
        store.create_node(&node("a", None), &registration("a")).await.unwrap();
        assert!(store.delete_node("a").await.unwrap());
        assert!(!store.delete_node("a").await.unwrap());
        assert!(store.get_node("a").await.unwrap().is_none());
        assert_eq!(store.list_events("a", 10).await.unwrap().len(), 1);

        // The id can be registered again after removal.
        store.create_node(&node("a", None), &registration("a")).await.unwrap();
        assert_eq!(store.list_events("a", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_put_unknown_node() {
        let store = MemoryStore::new();
        let err = store.put_node(&node("ghost", Some(1)), None).await.unwrap_err();
        assert!(matches!(err, MeshError::UnknownNode(_)));
        assert!(!store.set_derived_status("ghost", DerivedStatus::Stale, None).await.unwrap());
    }
}
