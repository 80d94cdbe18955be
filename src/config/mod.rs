use anyhow::{Context, Result};
use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::MeshResult;
use crate::services::liveness::{LivenessPolicy, LivenessThresholds};

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_OFFLINE_THRESHOLD_SECS: u64 = 900;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means the in-memory store.
    pub database_url: Option<String>,
    pub heartbeat_interval_secs: u64,
    pub offline_threshold_secs: u64,
    pub sweep_interval_secs: u64,
    pub storage_timeout_ms: u64,
    pub history_limit: usize,
    pub maintenance_exempt: bool,
    /// 0 disables the exporter.
    pub prometheus_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            offline_threshold_secs: DEFAULT_OFFLINE_THRESHOLD_SECS,
            sweep_interval_secs: 60,
            storage_timeout_ms: 5_000,
            history_limit: DEFAULT_HISTORY_LIMIT,
            maintenance_exempt: false,
            prometheus_port: 9898,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let defaults = Config::default();
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            heartbeat_interval_secs: parse_var("HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval_secs)?,
            offline_threshold_secs: parse_var("OFFLINE_THRESHOLD_SECS", defaults.offline_threshold_secs)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            storage_timeout_ms: parse_var("STORAGE_TIMEOUT_MS", defaults.storage_timeout_ms)?,
            history_limit: parse_var("HISTORY_LIMIT", defaults.history_limit)?,
            maintenance_exempt: parse_var("MAINTENANCE_EXEMPT", defaults.maintenance_exempt)?,
            prometheus_port: parse_var("PROMETHEUS_PORT", defaults.prometheus_port)?,
        })
    }

    /// Fails with `ConfigInvariantViolation` unless interval < threshold.
    pub fn thresholds(&self) -> MeshResult<LivenessThresholds> {
        LivenessThresholds::from_secs(self.heartbeat_interval_secs, self.offline_threshold_secs)
    }

    pub fn policy(&self) -> LivenessPolicy {
        LivenessPolicy {
            maintenance_exempt: self.maintenance_exempt,
        }
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        _ => Ok(default),
    }
}
