//! Liveness classification.
//!
//! A node's derived status depends only on how long ago we last heard from
//! it, compared against two thresholds:
//!
//! ```text
//!   elapsed <= interval               online
//!   interval < elapsed <= threshold   stale
//!   elapsed > threshold               offline
//! ```
//!
//! [`classify`] is the pure rule. [`LivenessEvaluator`] layers the
//! maintenance policy on top and is shared by queries and the sweeper.

use chrono::{DateTime, Duration, Utc};

use crate::error::{MeshError, MeshResult};
use crate::models::{DerivedStatus, Node, SelfReportedStatus};

/// Validated pair of thresholds. Construction enforces
/// `0 < heartbeat_interval < offline_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessThresholds {
    heartbeat_interval: Duration,
    offline_threshold: Duration,
}

impl LivenessThresholds {
    pub fn new(heartbeat_interval: Duration, offline_threshold: Duration) -> MeshResult<Self> {
        if heartbeat_interval <= Duration::zero() || heartbeat_interval >= offline_threshold {
            return Err(MeshError::ConfigInvariantViolation {
                interval_secs: heartbeat_interval.num_seconds(),
                threshold_secs: offline_threshold.num_seconds(),
            });
        }
        Ok(Self {
            heartbeat_interval,
            offline_threshold,
        })
    }

    pub fn from_secs(heartbeat_interval: u64, offline_threshold: u64) -> MeshResult<Self> {
        let violation = || MeshError::ConfigInvariantViolation {
            interval_secs: i64::try_from(heartbeat_interval).unwrap_or(i64::MAX),
            threshold_secs: i64::try_from(offline_threshold).unwrap_or(i64::MAX),
        };
        let to_duration = |secs: u64| {
            i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or_else(violation)
        };
        Self::new(to_duration(heartbeat_interval)?, to_duration(offline_threshold)?)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn offline_threshold(&self) -> Duration {
        self.offline_threshold
    }
}

/// Pure elapsed-time classification. A `last_seen` in the future counts as
/// online.
pub fn classify(last_seen: DateTime<Utc>, now: DateTime<Utc>, thresholds: &LivenessThresholds) -> DerivedStatus {
    let elapsed = now - last_seen;
    if elapsed <= thresholds.heartbeat_interval {
        DerivedStatus::Online
    } else if elapsed <= thresholds.offline_threshold {
        DerivedStatus::Stale
    } else {
        DerivedStatus::Offline
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Nodes reporting `maintenance` are never classified offline; they
    /// are capped at stale.
    pub maintenance_exempt: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LivenessEvaluator {
    thresholds: LivenessThresholds,
    policy: LivenessPolicy,
}

impl LivenessEvaluator {
    pub fn new(thresholds: LivenessThresholds, policy: LivenessPolicy) -> Self {
        Self { thresholds, policy }
    }

    pub fn thresholds(&self) -> &LivenessThresholds {
        &self.thresholds
    }

    pub fn policy(&self) -> LivenessPolicy {
        self.policy
    }

    pub fn evaluate(&self, node: &Node, now: DateTime<Utc>) -> DerivedStatus {
        let status = classify(node.liveness_anchor(), now, &self.thresholds);
        if status == DerivedStatus::Offline
            && self.policy.maintenance_exempt
            && node.self_reported_status == SelfReportedStatus::Maintenance
        {
            return DerivedStatus::Stale;
        }
        status
    }
}
