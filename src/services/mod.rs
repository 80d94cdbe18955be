//! The liveness and state-history core.
//!
//! [`MeshMonitor`] wires the four components around one explicitly
//! constructed store and clock:
//!
//! - [`NodeRegistry`]: registration, lookup, admin updates
//! - [`HeartbeatProcessor`]: heartbeat ingest and significance rule
//! - [`HistoryLog`]: append and bounded recent-history reads
//! - [`LivenessEvaluator`] / [`LivenessSweeper`]: derived status on demand
//!   and as a periodic sweep

use log::error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub mod heartbeat;
pub mod history;
pub mod liveness;
pub mod registry;
pub mod sweeper;

pub use heartbeat::{Heartbeat, HeartbeatOutcome, HeartbeatProcessor};
pub use history::HistoryLog;
pub use liveness::{classify, LivenessEvaluator, LivenessPolicy, LivenessThresholds};
pub use registry::{NewNode, NodeRegistry};
pub use sweeper::{LivenessSweeper, SweepReport, SweeperHandle};

use crate::clock::Clock;
use crate::config::Config;
use crate::db::NodeStore;
use crate::error::{MeshError, MeshResult};
use crate::metrics;
use crate::models::{FleetSummary, NodeDetail, NodeSummary};
use crate::utils::{bounded, locks::NodeLocks};

/// Shared plumbing handed to every component.
#[derive(Clone)]
pub struct CoreContext {
    pub store: Arc<dyn NodeStore>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<NodeLocks>,
    pub storage_timeout: Duration,
}

impl CoreContext {
    pub fn new(store: Arc<dyn NodeStore>, clock: Arc<dyn Clock>, storage_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            locks: Arc::new(NodeLocks::new()),
            storage_timeout,
        }
    }

    /// Run a storage call under the configured timeout, logging and
    /// counting collaborator failures.
    pub async fn storage<T, F>(&self, op: &'static str, fut: F) -> MeshResult<T>
    where
        F: Future<Output = MeshResult<T>>,
    {
        let res = bounded(self.storage_timeout, op, fut).await;
        if let Err(MeshError::StorageUnavailable(reason)) = &res {
            error!("Storage {} failed: {}", op, reason);
            metrics::record_storage_failure(op);
        }
        res
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub thresholds: LivenessThresholds,
    pub policy: LivenessPolicy,
    pub storage_timeout: Duration,
    pub history_limit: usize,
}

impl MonitorSettings {
    pub fn from_config(cfg: &Config) -> MeshResult<Self> {
        Ok(Self {
            thresholds: cfg.thresholds()?,
            policy: cfg.policy(),
            storage_timeout: cfg.storage_timeout(),
            history_limit: cfg.history_limit,
        })
    }
}

pub struct MeshMonitor {
    pub registry: NodeRegistry,
    pub heartbeats: HeartbeatProcessor,
    pub history: HistoryLog,
    pub liveness: LivenessEvaluator,
    ctx: CoreContext,
    history_limit: usize,
}

impl MeshMonitor {
    pub fn new(store: Arc<dyn NodeStore>, clock: Arc<dyn Clock>, settings: MonitorSettings) -> Self {
        let ctx = CoreContext::new(store, clock, settings.storage_timeout);
        Self {
            registry: NodeRegistry::new(ctx.clone()),
            heartbeats: HeartbeatProcessor::new(ctx.clone()),
            history: HistoryLog::new(ctx.clone()),
            liveness: LivenessEvaluator::new(settings.thresholds, settings.policy),
            ctx,
            history_limit: settings.history_limit,
        }
    }

    pub fn context(&self) -> &CoreContext {
        &self.ctx
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Registry listing with liveness evaluated against the current clock.
    pub async fn list_with_status(&self) -> MeshResult<Vec<NodeSummary>> {
        let now = self.ctx.clock.now();
        let nodes = self.registry.list().await?;
        Ok(nodes
            .iter()
            .map(|node| NodeSummary::from_node(node, self.liveness.evaluate(node, now)))
            .collect())
    }

    pub async fn node_detail(&self, node_id: &str) -> MeshResult<NodeDetail> {
        let node = self.registry.get(node_id).await?;
        let history = self.history.recent(node_id, self.history_limit).await?;
        let derived_status = self.liveness.evaluate(&node, self.ctx.clock.now());
        Ok(NodeDetail {
            node,
            derived_status,
            history,
        })
    }

    pub async fn fleet_summary(&self) -> MeshResult<FleetSummary> {
        let mut summary = FleetSummary::default();
        for node in self.list_with_status().await? {
            summary.record(node.derived_status);
        }
        Ok(summary)
    }

    pub fn sweeper(&self) -> LivenessSweeper {
        LivenessSweeper::new(self.ctx.clone(), self.liveness)
    }
}
