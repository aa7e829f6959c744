use async_trait::async_trait;
use sqlx::Row;

use quiz_core::model::SubjectId;

use crate::repository::{BookmarkRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl BookmarkRepository for SqliteRepository {
    async fn save_bookmarks(
        &self,
        subject: &SubjectId,
        positions: &[usize],
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(positions)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO bookmarks (subject, positions)
            VALUES (?1, ?2)
            ON CONFLICT(subject) DO UPDATE SET
                positions = excluded.positions
            ",
        )
        .bind(subject.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn load_bookmarks(&self, subject: &SubjectId) -> Result<Vec<usize>, StorageError> {
        let row = sqlx::query("SELECT positions FROM bookmarks WHERE subject = ?1")
            .bind(subject.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };

        let payload: String = row
            .try_get("positions")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        serde_json::from_str(&payload).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}
