use async_trait::async_trait;
use sqlx::Row;

use quiz_core::model::SubjectId;

use crate::repository::{PlayerSettingsRepository, StorageError};

use super::SqliteRepository;

impl SqliteRepository {
    async fn settings_column(&self, column: &str) -> Result<Option<String>, StorageError> {
        // Column names come from the two callers below, never from input.
        let row = sqlx::query(&format!(
            "SELECT {column} FROM player_settings WHERE id = 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        row.try_get(0)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

#[async_trait]
impl PlayerSettingsRepository for SqliteRepository {
    async fn active_subject(&self) -> Result<Option<SubjectId>, StorageError> {
        Ok(self
            .settings_column("active_subject")
            .await?
            .map(SubjectId::new))
    }

    async fn set_active_subject(&self, subject: &SubjectId) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO player_settings (id, active_subject)
            VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET
                active_subject = excluded.active_subject
            ",
        )
        .bind(subject.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn player_id(&self) -> Result<Option<String>, StorageError> {
        self.settings_column("player_id").await
    }

    async fn set_player_id(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO player_settings (id, player_id)
            VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET
                player_id = excluded.player_id
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
