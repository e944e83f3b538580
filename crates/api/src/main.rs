use anyhow::Result;
use domain::services::{profile_channel, ProfileSync};
use persistence::listener::spawn_profile_listener;
use persistence::metrics::record_pool_metrics;
use std::time::Duration;
use tracing::info;

use secret_santa_api::{app, config, middleware};

const POOL_METRICS_INTERVAL: Duration = Duration::from_secs(30);
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting Secret Santa API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database).await?;
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    // Membership display fields follow profile changes
    let (profile_tx, profile_rx) = profile_channel();
    let backends = app::Backends::postgres(pool.clone());
    ProfileSync::new(backends.groups.clone()).spawn(profile_rx);
    spawn_profile_listener(pool.clone(), profile_tx);

    let metrics_pool = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POOL_METRICS_INTERVAL);
        loop {
            interval.tick().await;
            record_pool_metrics(&metrics_pool);
        }
    });

    let addr = config.socket_addr()?;
    let state = app::AppState::new(config, backends)?;

    if let Some(limiter) = state.rate_limiter.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                let tracked = limiter.prune();
                tracing::debug!(tracked, "Rate limiter pruned");
            }
        });
    }

    let router = app::router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
