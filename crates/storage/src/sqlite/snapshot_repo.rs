use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use quiz_core::model::SubjectId;

use crate::repository::{SnapshotRecord, SnapshotRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn save_snapshot(
        &self,
        subject: &SubjectId,
        record: &SnapshotRecord,
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(record)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO snapshots (subject, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(subject) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(subject.as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn load_snapshot(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<SnapshotRecord>, StorageError> {
        let row = sqlx::query("SELECT payload FROM snapshots WHERE subject = ?1")
            .bind(subject.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }
}
