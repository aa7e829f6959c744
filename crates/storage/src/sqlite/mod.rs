use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod bookmark_repo;
mod history_repo;
mod migrate;
mod settings_repo;
mod snapshot_repo;

/// SQLite backing for every storage port, sharing one connection pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool for the given database URL.
    ///
    /// Every connection enforces foreign keys, uses WAL journaling, and
    /// waits out short lock contention instead of failing.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when the URL does not parse or the pool
    /// cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to the current version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` whose four ports all share one `SQLite` pool.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when connecting or migrating fails.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self {
            snapshots: Arc::new(repo.clone()),
            bookmarks: Arc::new(repo.clone()),
            history: Arc::new(repo.clone()),
            settings: Arc::new(repo),
        })
    }
}
