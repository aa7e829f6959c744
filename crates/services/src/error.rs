//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{SessionError, SubjectId};

/// Errors raised while fetching or parsing a question bank.
///
/// These are the only user-visible failures: a session cannot start without
/// its bank and nothing is retried automatically.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("bank request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no bank resource for subject {0}")]
    Missing(SubjectId),
    #[error("bank for subject {0} contains no questions")]
    EmptyBank(SubjectId),
}

/// Errors emitted by `PlayerService`.
///
/// Persistence failures never appear here: snapshot and bookmark writes are
/// swallowed (logged) so the in-memory session is never rolled back.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayerError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("subject changed while its bank was loading")]
    StaleSubject,
}
