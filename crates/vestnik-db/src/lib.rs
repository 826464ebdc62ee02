//! News storage over Postgres: pool management, filtered reads, and the
//! batch-inserting stream writer.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

pub mod filter;
mod news;
mod stream_writer;

pub use filter::{total_pages, Filter, SortBy, TimeFilter, TimeOp, PAGE_SIZE};
pub use news::{add_items, count_items, item, item_by_link, items};
pub use stream_writer::write_to_storage;

// Path relative to crates/vestnik-db/Cargo.toml; resolves to
// <workspace-root>/migrations/news/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/news");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("connect news store: number of retries exceeded")]
    RetriesExceeded,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to the news store.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to the news store, retrying `attempts` times at `backoff`
/// intervals. Startup tolerates the store coming up after the service.
///
/// # Errors
///
/// Returns [`DbError::RetriesExceeded`] when every attempt fails.
pub async fn connect_pool_with_retries(
    database_url: &str,
    attempts: u32,
    backoff: Duration,
) -> Result<PgPool, DbError> {
    for attempt in 1..=attempts {
        match connect_pool(database_url, PoolConfig::default()).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "news store connect failed");
                tokio::time::sleep(backoff).await;
            }
        }
    }
    Err(DbError::RetriesExceeded)
}

/// Run all pending migrations against the pool.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
