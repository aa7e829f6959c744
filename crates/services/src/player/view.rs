use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

use quiz_core::model::SubjectId;
use storage::repository::{HistoryEntry, HistoryRepository};

/// Presentation-agnostic row for one completed run.
///
/// No pre-formatted strings and no localization assumptions; the UI formats
/// timestamps and durations as it sees fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryListItem {
    pub recorded_at: DateTime<Utc>,
    pub subject: SubjectId,
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub wrong: usize,
    pub elapsed_seconds: u64,
    pub accuracy_percent: u32,
}

impl HistoryListItem {
    #[must_use]
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            recorded_at: entry.recorded_at,
            subject: entry.subject.clone(),
            total: entry.total,
            answered: entry.answered,
            correct: entry.correct,
            wrong: entry.wrong,
            elapsed_seconds: entry.elapsed_seconds,
            accuracy_percent: entry.accuracy_percent,
        }
    }
}

/// Read side of the completed-run history.
///
/// Writes happen in `PlayerService::submit`; a failed read degrades to an
/// empty list, the same as a player with no history yet.
#[derive(Clone)]
pub struct HistoryService {
    history: Arc<dyn HistoryRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn HistoryRepository>) -> Self {
        Self { history }
    }

    /// Most recent runs, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<HistoryListItem> {
        match self.history.recent_history(limit).await {
            Ok(entries) => entries.iter().map(HistoryListItem::from_entry).collect(),
            Err(err) => {
                warn!(error = %err, "history read failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn lists_newest_first_and_degrades_to_empty() {
        let repo = InMemoryRepository::new();
        for i in 0..3_usize {
            let entry = HistoryEntry {
                recorded_at: fixed_now() + chrono::Duration::seconds(i as i64),
                subject: SubjectId::new("c.json"),
                total: 5,
                answered: 5,
                correct: i,
                wrong: 5 - i,
                elapsed_seconds: 30,
                accuracy_percent: 40,
            };
            repo.append_history(&entry).await.unwrap();
        }

        let service = HistoryService::new(Arc::new(repo));
        let items = service.recent(2).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].correct, 2);

        let empty = HistoryService::new(Arc::new(InMemoryRepository::new()));
        assert!(empty.recent(10).await.is_empty());
    }
}
