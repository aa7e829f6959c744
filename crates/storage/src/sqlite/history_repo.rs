use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use quiz_core::model::SubjectId;

use crate::repository::{HISTORY_LIMIT, HistoryEntry, HistoryRepository, StorageError};

use super::SqliteRepository;

fn to_i64(value: usize, field: &str) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::Serialization(format!("{field} overflows")))
}

fn read_count(row: &sqlx::sqlite::SqliteRow, field: &str) -> Result<usize, StorageError> {
    let value: i64 = row
        .try_get(field)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    usize::try_from(value)
        .map_err(|_| StorageError::Serialization(format!("negative {field} in history row")))
}

#[async_trait]
impl HistoryRepository for SqliteRepository {
    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO history (
                recorded_at,
                subject,
                total,
                answered,
                correct,
                wrong,
                elapsed_seconds,
                accuracy_percent
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(entry.recorded_at)
        .bind(entry.subject.as_str())
        .bind(to_i64(entry.total, "total")?)
        .bind(to_i64(entry.answered, "answered")?)
        .bind(to_i64(entry.correct, "correct")?)
        .bind(to_i64(entry.wrong, "wrong")?)
        .bind(
            i64::try_from(entry.elapsed_seconds)
                .map_err(|_| StorageError::Serialization("elapsed_seconds overflows".into()))?,
        )
        .bind(i64::from(entry.accuracy_percent))
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        // Keep only the newest HISTORY_LIMIT rows.
        sqlx::query(
            r"
            DELETE FROM history
            WHERE id NOT IN (
                SELECT id FROM history
                ORDER BY recorded_at DESC, id DESC
                LIMIT ?1
            )
            ",
        )
        .bind(to_i64(HISTORY_LIMIT, "limit")?)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                recorded_at,
                subject,
                total,
                answered,
                correct,
                wrong,
                elapsed_seconds,
                accuracy_percent
            FROM history
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?1
            ",
        )
        .bind(to_i64(limit, "limit")?)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let recorded_at: DateTime<Utc> = row
                .try_get("recorded_at")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            let subject: String = row
                .try_get("subject")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            let elapsed: i64 = row
                .try_get("elapsed_seconds")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            let accuracy: i64 = row
                .try_get("accuracy_percent")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;

            entries.push(HistoryEntry {
                recorded_at,
                subject: SubjectId::new(subject),
                total: read_count(&row, "total")?,
                answered: read_count(&row, "answered")?,
                correct: read_count(&row, "correct")?,
                wrong: read_count(&row, "wrong")?,
                elapsed_seconds: u64::try_from(elapsed).map_err(|_| {
                    StorageError::Serialization("negative elapsed_seconds in history row".into())
                })?,
                accuracy_percent: u32::try_from(accuracy).map_err(|_| {
                    StorageError::Serialization("negative accuracy_percent in history row".into())
                })?,
            });
        }
        Ok(entries)
    }
}
