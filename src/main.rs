use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;

use mesh_monitor::cli::{commands, Cli, Commands};
use mesh_monitor::db::{self, MemoryStore, NodeStore, PgStore};
use mesh_monitor::{metrics, Config, MeshMonitor, MeshService, MonitorSettings, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    // Reject inconsistent liveness settings before touching anything else.
    let settings = MonitorSettings::from_config(&cfg).context("Invalid liveness configuration")?;

    let store = open_store(&cfg, &cli).await?;
    if cli.command() == Commands::InitDb {
        if store.is_none() {
            warn!("init-db with the in-memory store does nothing");
        }
        return Ok(());
    }
    let store: Arc<dyn NodeStore> = match store {
        Some(pg) => Arc::new(pg),
        None => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if cfg.prometheus_port != 0 {
        metrics::install_exporter(cfg.prometheus_port).context("Failed to start metrics exporter")?;
        info!("Serving metrics on port {}", cfg.prometheus_port);
    }

    let monitor = Arc::new(MeshMonitor::new(store, Arc::new(SystemClock), settings));

    match cli.command() {
        Commands::Sweep => {
            let report = monitor.sweeper().sweep_once().await.context("Sweep failed")?;
            println!(
                "Sweep: {} scanned, {} transitions, {} failures",
                report.scanned, report.transitions, report.failures
            );
        }
        Commands::Console | Commands::InitDb => {
            let sweeper = monitor.sweeper().spawn(cfg.sweep_interval());
            let service = MeshService::new(monitor.clone());
            let result = commands::run_console(&service).await;
            sweeper.shutdown().await;
            if let Err(e) = &result {
                error!("Console exited with error: {:#}", e);
            }
            result?;
        }
    }
    Ok(())
}

/// Connect and create the schema when a database is configured.
async fn open_store(cfg: &Config, cli: &Cli) -> Result<Option<PgStore>> {
    let Some(url) = cfg.database_url.as_deref().filter(|_| !cli.memory) else {
        return Ok(None);
    };
    let pool = db::init_pool(url, cfg.storage_timeout())
        .await
        .context("Failed to connect to database")?;
    db::init_schema(&pool).await.context("Failed to create schema")?;
    info!("Database OK.");
    Ok(Some(PgStore::new(pool)))
}
