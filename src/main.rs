use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use calsync::config;
use calsync::queue::{SyncQueue, SyncQueueOptions};
use calsync::remote::RestStore;
use calsync::store::{self, SqliteStore};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/calsync.db", cfg.app.data_dir));
    let pool = store::init_pool(&database_url).await?;
    store::run_migrations(&pool).await?;

    let rest = RestStore::new(
        &cfg.remote.base_url,
        cfg.remote.api_key.clone(),
        cfg.remote.table.clone(),
    )?;
    let storage = Arc::new(SqliteStore::new(pool));
    let options = SyncQueueOptions {
        reconnect_delay: Duration::from_millis(cfg.app.reconnect_delay_ms),
        enqueue_delay: Duration::from_millis(cfg.app.enqueue_delay_ms),
        inter_item_delay: Duration::from_millis(cfg.app.inter_item_delay_ms),
    };
    let queue = SyncQueue::restore(Arc::new(rest.clone()), storage, options).await?;

    // Connectivity monitor: probes the remote store and flips the flag;
    // a reconnect schedules its own flush.
    let probe_queue = queue.clone();
    let probe_interval = Duration::from_secs(cfg.app.probe_interval_secs);
    tokio::spawn(async move {
        loop {
            let online = rest.ping().await;
            probe_queue.set_online_status(online).await;
            tokio::time::sleep(probe_interval).await;
        }
    });

    // Periodic flush, layered on the event-driven triggers. All routes go
    // through the same guarded entry point.
    let flush_queue = queue.clone();
    let flush_interval = Duration::from_secs(cfg.app.flush_interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(flush_interval).await;
            flush_queue.sync_pending_transactions().await;
        }
    });

    info!("sync agent started");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
