//! checkhtml - URL health monitor
//!
//! Periodically probes registered URLs and records status, page size, link
//! count and latency for each attempt.

mod config;
mod db;
mod probe;
mod scheduler;
mod web;

use config::{Persistence, ServerConfig};
use db::{HistoryResults, LatestOnlyResults, ResultStore, Store};
use probe::HttpProber;
use scheduler::{CheckCycle, CycleOptions, Scheduler, SystemClock};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("checkhtml=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting checkhtml on port {}...", cfg.http_port);
    tracing::info!("Using database at {} ({:?} results)", cfg.db_path, cfg.persistence);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let results: Arc<dyn ResultStore> = match cfg.persistence {
        Persistence::History => Arc::new(HistoryResults::new(store.clone())),
        Persistence::Latest => Arc::new(LatestOnlyResults::new(store.clone())),
    };

    let cycle = CheckCycle::new(
        store.clone(),
        results,
        Arc::new(HttpProber::new()?),
        Arc::new(SystemClock),
        CycleOptions {
            probe_timeout: cfg.probe_timeout,
            max_concurrent_probes: cfg.max_concurrent_probes,
            dedup: cfg.dedup,
        },
    );

    let scheduler = Scheduler::new(cycle.clone(), cfg.check_interval);
    let min_recheck = cfg.min_recheck_interval;
    let server = Server::new(cfg, store, cycle);

    tokio::select! {
        _ = scheduler.start(min_recheck) => {}
        res = server.start() => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
