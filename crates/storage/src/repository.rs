use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{AnswerRecord, SessionSnapshot, SubjectId};
use quiz_core::time::{epoch_millis, from_epoch_millis};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Most history entries kept per player; older runs are dropped on append.
pub const HISTORY_LIMIT: usize = 50;

//
// ─── SNAPSHOT RECORD ───────────────────────────────────────────────────────────
//

/// Wire form of one answer slot.
///
/// `correctIndex: -1` encodes a question that carried no correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub picked: i64,
    #[serde(rename = "correctIndex")]
    pub correct_index: i64,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

impl AnswerEntry {
    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            picked: record.picked() as i64,
            correct_index: record.correct().map_or(-1, |index| index as i64),
            is_correct: record.is_correct(),
        }
    }

    fn into_record(self) -> Result<AnswerRecord, StorageError> {
        let picked = to_index(self.picked)?;
        let correct = if self.correct_index < 0 {
            None
        } else {
            Some(to_index(self.correct_index)?)
        };
        Ok(AnswerRecord::from_persisted(picked, correct, self.is_correct))
    }
}

/// Serialized session snapshot, one entry per subject.
///
/// Field names match the JSON the earlier players persisted: `index`,
/// `startTime` in epoch milliseconds, `questionOrder`, and an
/// `answerOrderMap` keyed by stringified display position. This mirror
/// keeps the domain `SessionSnapshot` free of storage concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub index: i64,
    pub score: i64,
    pub answered: Vec<Option<AnswerEntry>>,
    pub viewed: Vec<bool>,
    pub length: i64,
    #[serde(rename = "startTime")]
    pub start_time: Option<i64>,
    #[serde(rename = "questionOrder", default)]
    pub question_order: Vec<i64>,
    #[serde(rename = "answerOrderMap", default)]
    pub answer_order_map: HashMap<String, Vec<i64>>,
}

impl SnapshotRecord {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let answer_order_map = snapshot
            .option_permutations
            .iter()
            .enumerate()
            .map(|(position, permutation)| {
                let values = permutation.iter().map(|&index| index as i64).collect();
                (position.to_string(), values)
            })
            .collect();
        Self {
            index: snapshot.current as i64,
            score: i64::from(snapshot.score),
            answered: snapshot
                .answers
                .iter()
                .map(|slot| slot.as_ref().map(AnswerEntry::from_record))
                .collect(),
            viewed: snapshot.viewed.clone(),
            length: snapshot.length as i64,
            start_time: snapshot.started_at.map(epoch_millis),
            question_order: snapshot
                .question_permutation
                .iter()
                .map(|&index| index as i64)
                .collect(),
            answer_order_map,
        }
    }

    /// Convert the record back into a domain snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` on negative indices or counts.
    /// A missing `answerOrderMap` becomes an empty table, which the session
    /// regenerates on resume; a partially filled one is passed through and
    /// fails order validation there.
    pub fn into_snapshot(self) -> Result<SessionSnapshot, StorageError> {
        let length = to_index(self.length)?;
        let option_permutations = if self.answer_order_map.is_empty() {
            Vec::new()
        } else {
            let mut tables = Vec::with_capacity(length);
            for position in 0..length {
                let table = match self.answer_order_map.get(&position.to_string()) {
                    Some(values) => values
                        .iter()
                        .map(|&value| to_index(value))
                        .collect::<Result<Vec<usize>, StorageError>>()?,
                    None => Vec::new(),
                };
                tables.push(table);
            }
            tables
        };

        Ok(SessionSnapshot {
            current: to_index(self.index)?,
            score: u32::try_from(self.score)
                .map_err(|_| StorageError::Serialization("negative score".into()))?,
            answers: self
                .answered
                .into_iter()
                .map(|slot| slot.map(AnswerEntry::into_record).transpose())
                .collect::<Result<Vec<Option<AnswerRecord>>, StorageError>>()?,
            viewed: self.viewed,
            length,
            started_at: self.start_time.and_then(from_epoch_millis),
            question_permutation: self
                .question_order
                .into_iter()
                .map(to_index)
                .collect::<Result<Vec<usize>, StorageError>>()?,
            option_permutations,
        })
    }
}

fn to_index(value: i64) -> Result<usize, StorageError> {
    usize::try_from(value).map_err(|_| StorageError::Serialization("negative index".into()))
}

//
// ─── HISTORY ───────────────────────────────────────────────────────────────────
//

/// One completed run, as listed in the player's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub subject: SubjectId,
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub wrong: usize,
    pub elapsed_seconds: u64,
    pub accuracy_percent: u32,
}

//
// ─── PORTS ─────────────────────────────────────────────────────────────────────
//

/// Session snapshots keyed by subject. Last writer wins; callers treat any
/// failed or corrupt read as "no prior snapshot".
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Persist or replace the subject's snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(
        &self,
        subject: &SubjectId,
        record: &SnapshotRecord,
    ) -> Result<(), StorageError>;

    /// Fetch the subject's snapshot, `None` when nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn load_snapshot(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<SnapshotRecord>, StorageError>;
}

/// Bookmarked display positions per subject, independent of the session
/// lifecycle.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Persist or replace the subject's bookmark list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the list cannot be stored.
    async fn save_bookmarks(
        &self,
        subject: &SubjectId,
        positions: &[usize],
    ) -> Result<(), StorageError>;

    /// Fetch the subject's bookmarks, empty when nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn load_bookmarks(&self, subject: &SubjectId) -> Result<Vec<usize>, StorageError>;
}

/// Completed-run history, newest first, capped at `HISTORY_LIMIT`.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Prepend an entry, dropping the oldest beyond the cap.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StorageError>;

    /// Most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>, StorageError>;
}

/// Per-player settings: the active subject and the anonymous player id.
#[async_trait]
pub trait PlayerSettingsRepository: Send + Sync {
    /// The subject last made active, `None` before the first selection.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn active_subject(&self) -> Result<Option<SubjectId>, StorageError>;

    /// Record the active subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set_active_subject(&self, subject: &SubjectId) -> Result<(), StorageError>;

    /// The stored anonymous player id, `None` before one was minted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn player_id(&self) -> Result<Option<String>, StorageError>;

    /// Record the anonymous player id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set_player_id(&self, id: &str) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    snapshots: Arc<Mutex<HashMap<SubjectId, SnapshotRecord>>>,
    bookmarks: Arc<Mutex<HashMap<SubjectId, Vec<usize>>>>,
    history: Arc<Mutex<Vec<HistoryEntry>>>,
    settings: Arc<Mutex<(Option<SubjectId>, Option<String>)>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> Result<std::sync::MutexGuard<'a, T>, StorageError> {
    mutex
        .lock()
        .map_err(|err| StorageError::Connection(err.to_string()))
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn save_snapshot(
        &self,
        subject: &SubjectId,
        record: &SnapshotRecord,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.snapshots)?;
        guard.insert(subject.clone(), record.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<SnapshotRecord>, StorageError> {
        let guard = lock(&self.snapshots)?;
        Ok(guard.get(subject).cloned())
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryRepository {
    async fn save_bookmarks(
        &self,
        subject: &SubjectId,
        positions: &[usize],
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.bookmarks)?;
        guard.insert(subject.clone(), positions.to_vec());
        Ok(())
    }

    async fn load_bookmarks(&self, subject: &SubjectId) -> Result<Vec<usize>, StorageError> {
        let guard = lock(&self.bookmarks)?;
        Ok(guard.get(subject).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryRepository {
    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StorageError> {
        let mut guard = lock(&self.history)?;
        guard.insert(0, entry.clone());
        guard.truncate(HISTORY_LIMIT);
        Ok(())
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>, StorageError> {
        let guard = lock(&self.history)?;
        Ok(guard.iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl PlayerSettingsRepository for InMemoryRepository {
    async fn active_subject(&self) -> Result<Option<SubjectId>, StorageError> {
        let guard = lock(&self.settings)?;
        Ok(guard.0.clone())
    }

    async fn set_active_subject(&self, subject: &SubjectId) -> Result<(), StorageError> {
        let mut guard = lock(&self.settings)?;
        guard.0 = Some(subject.clone());
        Ok(())
    }

    async fn player_id(&self) -> Result<Option<String>, StorageError> {
        let guard = lock(&self.settings)?;
        Ok(guard.1.clone())
    }

    async fn set_player_id(&self, id: &str) -> Result<(), StorageError> {
        let mut guard = lock(&self.settings)?;
        guard.1 = Some(id.to_string());
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the persistence ports behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub settings: Arc<dyn PlayerSettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            snapshots: Arc::new(repo.clone()),
            bookmarks: Arc::new(repo.clone()),
            history: Arc::new(repo.clone()),
            settings: Arc::new(repo),
        }
    }
}
