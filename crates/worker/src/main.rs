//! Palaver background worker.
//!
//! Runs the email-verification-token cleanup sweep on a fixed interval,
//! independent of request traffic. Shutdown is cooperative: SIGINT flips a
//! watch channel, and the sweep loop exits promptly even mid-wait.

use std::sync::Arc;

use palaver_auth::{AuthConfig, CleanupWorker, PgAuthStore, SystemClock};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting Palaver worker");

    #[allow(clippy::expect_used)] // Fail-fast on startup if required config is missing
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let config = AuthConfig::from_env()?;

    let pool = palaver_shared::create_pool(&database_url).await?;
    palaver_shared::run_migrations(&pool).await?;

    let store = Arc::new(PgAuthStore::new(pool));
    let worker = CleanupWorker::new(store, Arc::new(SystemClock), config.cleanup_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping worker");

    // A closed channel also stops the worker; the send result is moot.
    let _ = shutdown_tx.send(true);
    worker_handle.await?;

    info!("Palaver worker stopped");
    Ok(())
}
