use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::MeshError;

/// Opaque key-value metadata carried by nodes and heartbeats.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Status a node claims about itself in its heartbeats.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SelfReportedStatus {
    Registered,
    Ok,
    Online,
    Warning,
    Error,
    Offline,
    Maintenance,
}

impl SelfReportedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfReportedStatus::Registered => "registered",
            SelfReportedStatus::Ok => "ok",
            SelfReportedStatus::Online => "online",
            SelfReportedStatus::Warning => "warning",
            SelfReportedStatus::Error => "error",
            SelfReportedStatus::Offline => "offline",
            SelfReportedStatus::Maintenance => "maintenance",
        }
    }

    /// Statuses worth a permanent history entry.
    pub fn is_significant(&self) -> bool {
        matches!(
            self,
            SelfReportedStatus::Error
                | SelfReportedStatus::Warning
                | SelfReportedStatus::Offline
                | SelfReportedStatus::Maintenance
        )
    }
}

impl fmt::Display for SelfReportedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SelfReportedStatus {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registered" => Ok(SelfReportedStatus::Registered),
            "ok" => Ok(SelfReportedStatus::Ok),
            "online" => Ok(SelfReportedStatus::Online),
            "warning" => Ok(SelfReportedStatus::Warning),
            "error" => Ok(SelfReportedStatus::Error),
            "offline" => Ok(SelfReportedStatus::Offline),
            "maintenance" => Ok(SelfReportedStatus::Maintenance),
            other => Err(MeshError::InvalidInput(format!("unknown status '{}'", other))),
        }
    }
}

/// Liveness as we believe it, computed from elapsed time only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    Online,
    Stale,
    Offline,
}

impl DerivedStatus {
    pub const ALL: [DerivedStatus; 3] = [DerivedStatus::Online, DerivedStatus::Stale, DerivedStatus::Offline];

    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedStatus::Online => "online",
            DerivedStatus::Stale => "stale",
            DerivedStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DerivedStatus {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(DerivedStatus::Online),
            "stale" => Ok(DerivedStatus::Stale),
            "offline" => Ok(DerivedStatus::Offline),
            other => Err(MeshError::InvalidInput(format!("unknown derived status '{}'", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub node_id: String,
    pub node_type: String,
    pub location: String,
    pub contact: Option<String>,
    pub ip_address: String,
    pub registration_date: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub self_reported_status: SelfReportedStatus,
    pub derived_status: DerivedStatus,
    pub profile: Details,
    pub details: Details,
}

impl Node {
    /// Reference point for liveness: last heartbeat, or registration if none yet.
    pub fn liveness_anchor(&self) -> DateTime<Utc> {
        self.last_seen.unwrap_or(self.registration_date)
    }
}

/// Administrative metadata patch. `None` leaves a field untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodeMetadataUpdate {
    pub node_type: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub ip_address: Option<String>,
    pub profile: Option<Details>,
}
