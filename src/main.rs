mod api;
mod config;
mod db;
mod error;
mod fetcher;
mod live;
mod state;
mod types;

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::SqliteEventStore;
use crate::error::Result;
use crate::fetcher::HttpFetcher;
use crate::live::{EventCache, LiveMonitor};
use crate::state::MemoryEventCache;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&format!("sqlite:{}?mode=rwc", cfg.db_path))
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Shared state ---
    let store = Arc::new(SqliteEventStore::new(pool));
    let cache = Arc::new(MemoryEventCache::new());
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let fetcher = Arc::new(HttpFetcher::new(cfg.fetch_timeout(), &cfg.user_agent)?);

    // --- Live monitor ---
    let monitor = LiveMonitor::new(
        store.clone(),
        store.clone(),
        fetcher,
        Some(cache.clone() as Arc<dyn EventCache>),
        cfg.monitor_config(),
    )
    .with_health(health.clone())
    .with_latency(latency.clone());
    info!(
        min_poll_secs = monitor.config().min_poll_interval.as_secs(),
        max_poll_secs = monitor.config().max_poll_interval.as_secs(),
        backoff = ?monitor.config().backoff_plan,
        "Live monitor configured"
    );

    let shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

    // --- HTTP API server ---
    let app = router(ApiState { store, cache, health, latency });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, shutting down"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await;

    shutdown.cancel();
    if let Err(e) = monitor_task.await {
        warn!("Live monitor task ended abnormally: {e}");
    }
    served?;
    Ok(())
}
