//! Shared infrastructure for the Palaver services.
//!
//! Owns database pool construction and migrations so that every binary
//! (API server, background worker) connects with the same tuning.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create the database connection pool used by request-serving code.
///
/// Tuning mirrors what the deployment has been running with: 25 connections
/// max, idle connections recycled after 15 minutes, no connection older than
/// an hour.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(25)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(15 * 60))
        .max_lifetime(Duration::from_secs(60 * 60))
        .connect(database_url)
        .await?;

    tracing::info!("Database pool created");
    Ok(pool)
}

/// Create a small pool for running migrations.
///
/// Migrations can hold locks for a while, so this pool tolerates a longer
/// acquire timeout than the request-serving pool.
pub async fn create_migration_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
}

/// Run pending migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
