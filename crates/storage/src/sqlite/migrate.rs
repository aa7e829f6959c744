use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Snapshots and bookmarks are key-value tables with JSON payloads keyed by
/// subject; history and player settings get plain columns.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS snapshots (
                    subject TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS bookmarks (
                    subject TEXT PRIMARY KEY,
                    positions TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS history (
                    id INTEGER PRIMARY KEY,
                    recorded_at TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    total INTEGER NOT NULL CHECK (total >= 0),
                    answered INTEGER NOT NULL CHECK (answered >= 0),
                    correct INTEGER NOT NULL CHECK (correct >= 0),
                    wrong INTEGER NOT NULL CHECK (wrong >= 0),
                    elapsed_seconds INTEGER NOT NULL CHECK (elapsed_seconds >= 0),
                    accuracy_percent INTEGER NOT NULL
                        CHECK (accuracy_percent BETWEEN 0 AND 100)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_history_recorded_at
                    ON history (recorded_at DESC, id DESC);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS player_settings (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    active_subject TEXT,
                    player_id TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}
