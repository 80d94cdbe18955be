//! Periodic liveness sweep.
//!
//! Each pass reads a snapshot of the registry without holding any node lock,
//! classifies every node, and only for nodes whose derived status moved takes
//! that node's lock, re-reads it and writes the new status together with a
//! `liveness_change` event. Every node write stands alone, so stopping midway
//! leaves nothing half-applied; the next pass picks up where this one left off.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{CoreContext, LivenessEvaluator};
use crate::error::MeshResult;
use crate::metrics;
use crate::models::{DerivedStatus, EventType, FleetSummary, HistoryEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub transitions: usize,
    pub failures: usize,
    /// Shutdown was requested before every node was visited.
    pub interrupted: bool,
    /// Per-status counts of the nodes visited, as published to the
    /// `mesh_nodes` gauges.
    pub fleet: FleetSummary,
}

#[derive(Clone)]
pub struct LivenessSweeper {
    ctx: CoreContext,
    evaluator: LivenessEvaluator,
}

impl LivenessSweeper {
    pub fn new(ctx: CoreContext, evaluator: LivenessEvaluator) -> Self {
        Self { ctx, evaluator }
    }

    /// One full pass.
    pub async fn sweep_once(&self) -> MeshResult<SweepReport> {
        self.sweep(None).await
    }

    async fn sweep(&self, shutdown: Option<&watch::Receiver<bool>>) -> MeshResult<SweepReport> {
        let snapshot = self
            .ctx
            .storage("list_nodes", self.ctx.store.list_nodes())
            .await?;
        let now = self.ctx.clock.now();
        let mut report = SweepReport::default();

        for node in snapshot {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                report.interrupted = true;
                break;
            }
            report.scanned += 1;

            let observed = self.evaluator.evaluate(&node, now);
            if observed == node.derived_status {
                report.fleet.record(observed);
                continue;
            }

            match self.apply_transition(&node.node_id).await {
                Ok(Some(next)) => {
                    report.transitions += 1;
                    report.fleet.record(next);
                }
                // Raced with a heartbeat or deregistration; keep the snapshot value.
                Ok(None) => report.fleet.record(node.derived_status),
                Err(e) => {
                    report.failures += 1;
                    report.fleet.record(node.derived_status);
                    warn!("Sweep could not update node {}: {}", node.node_id, e);
                }
            }
        }

        if !report.interrupted {
            metrics::record_fleet(&report.fleet);
        }
        Ok(report)
    }

    /// Re-evaluate one node under its lock. Returns the new status if a
    /// transition was written.
    async fn apply_transition(&self, node_id: &str) -> MeshResult<Option<DerivedStatus>> {
        let _guard = self.ctx.locks.lock(node_id).await;
        let Some(node) = self
            .ctx
            .storage("get_node", self.ctx.store.get_node(node_id))
            .await?
        else {
            return Ok(None);
        };

        let now = self.ctx.clock.now();
        let next = self.evaluator.evaluate(&node, now);
        if next == node.derived_status {
            return Ok(None);
        }

        let event = HistoryEvent::new(
            node_id,
            now,
            EventType::LivenessChange,
            format!("Liveness changed from {} to {}", node.derived_status, next),
        );
        let written = self
            .ctx
            .storage(
                "set_derived_status",
                self.ctx.store.set_derived_status(node_id, next, Some(&event)),
            )
            .await?;
        if !written {
            return Ok(None);
        }

        info!("Node {} is now {} (was {})", node_id, next, node.derived_status);
        metrics::record_transition(next);
        metrics::record_event(EventType::LivenessChange);
        Ok(Some(next))
    }

    /// Run `sweep_once` every `interval` on a background task.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown, rx) = watch::channel(false);
        let join = tokio::spawn(self.run(interval, rx));
        SweeperHandle { shutdown, join }
    }

    async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("Starting liveness sweeper (interval: {:?})", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.sweep(Some(&shutdown)).await {
                Ok(report) if report.interrupted => {
                    debug!("Sweep interrupted after {} nodes", report.scanned);
                    break;
                }
                Ok(report) => debug!(
                    "Sweep complete: {} scanned, {} transitions, {} failures",
                    report.scanned, report.transitions, report.failures
                ),
                Err(e) => error!("Liveness sweep failed: {}", e),
            }
        }
        info!("Liveness sweeper stopped");
    }
}

pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task and wait for it. A pass in progress stops before its
    /// next node.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!("Liveness sweeper task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
