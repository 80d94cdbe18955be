//! Liveness and state-history core for a mesh network monitoring system.
//!
//! Nodes register once, report heartbeats carrying a self-reported status,
//! and are classified as online, stale or offline from elapsed time alone.
//! Significant status reports and liveness transitions land in a per-node
//! history log.

pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod protocol;
pub mod services;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ErrorKind, MeshError, MeshResult};
pub use protocol::{MeshRequest, MeshResponse, MeshService};
pub use services::{MeshMonitor, MonitorSettings};
