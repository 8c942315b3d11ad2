//! # Database Connection
//!
//! The database is optional. When `DATABASE_URL` is set the registry runs
//! on [`PgPackStore`](packreg_registry::PgPackStore); otherwise it falls
//! back to the in-memory store, which loses state on restart.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to Postgres and apply migrations.
///
/// Returns `None` if `DATABASE_URL` is not set. Returns `Err` if the URL is
/// set but connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set; running with the in-memory store. \
                 Packs will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&url)
        .await?;
    tracing::info!("connected to PostgreSQL");

    packreg_registry::migrate(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

