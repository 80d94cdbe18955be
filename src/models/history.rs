use serde::{Serialize, Deserialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::MeshError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Registration,
    StatusChange,
    /// Derived status moved between online/stale/offline during a sweep.
    LivenessChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Registration => "registration",
            EventType::StatusChange => "status_change",
            EventType::LivenessChange => "liveness_change",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(EventType::Registration),
            "status_change" => Ok(EventType::StatusChange),
            "liveness_change" => Ok(EventType::LivenessChange),
            other => Err(MeshError::InvalidInput(format!("unknown event type '{}'", other))),
        }
    }
}

/// Append-only audit record. References its node by id only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    pub event_id: Uuid,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub details: String,
}

impl HistoryEvent {
    pub fn new(node_id: &str, timestamp: DateTime<Utc>, event_type: EventType, details: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            node_id: node_id.to_string(),
            timestamp,
            event_type,
            details,
        }
    }
}
