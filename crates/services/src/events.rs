//! Fire-and-forget reporting to external observers.
//!
//! The realtime leaderboard and the analytics backend both sit behind
//! `EventSink`; the engine writes to them keyed by an anonymous player id
//! and never reads anything back to make scoring decisions.

use uuid::Uuid;

use quiz_core::model::SubjectId;
use storage::repository::{PlayerSettingsRepository, StorageError};

/// Named events with primitive payloads, one variant per reported action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    QuizStart {
        subject: SubjectId,
        total: usize,
    },
    Answer {
        subject: SubjectId,
        position: usize,
        is_correct: bool,
        elapsed_seconds: u64,
    },
    QuizComplete {
        subject: SubjectId,
        total: usize,
        answered: usize,
        correct: usize,
        accuracy_percent: u32,
        elapsed_seconds: u64,
    },
    HintShown {
        subject: SubjectId,
        position: usize,
    },
    BookmarkAdded {
        subject: SubjectId,
        position: usize,
    },
    SubjectSwitch {
        from: SubjectId,
        to: SubjectId,
    },
}

/// Receiver for `QuizEvent`s.
///
/// Deliveries are fire-and-forget: implementations own their failures and
/// the caller never awaits an outcome.
pub trait EventSink: Send + Sync {
    fn emit(&self, player: &str, event: QuizEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _player: &str, _event: QuizEvent) {}
}

/// Mint a fresh anonymous player identifier.
#[must_use]
pub fn anonymous_player_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

/// Load the stored player id, minting and persisting one on first use.
///
/// # Errors
///
/// Returns `StorageError` when the settings store cannot be read or
/// written.
pub async fn ensure_player_id(
    settings: &dyn PlayerSettingsRepository,
) -> Result<String, StorageError> {
    if let Some(existing) = settings.player_id().await? {
        return Ok(existing);
    }
    let minted = anonymous_player_id();
    settings.set_player_id(&minted).await?;
    Ok(minted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    #[test]
    fn player_ids_are_prefixed_and_unique() {
        let a = anonymous_player_id();
        let b = anonymous_player_id();
        assert!(a.starts_with("user_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn ensure_player_id_is_stable_across_calls() {
        let repo = InMemoryRepository::new();
        let first = ensure_player_id(&repo).await.unwrap();
        let second = ensure_player_id(&repo).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.player_id().await.unwrap(), Some(first));
    }
}
