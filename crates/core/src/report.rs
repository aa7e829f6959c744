//! Derived score and progress values.
//!
//! Everything here is recomputed from the session on demand; nothing is a
//! second source of truth beyond the current render.

use chrono::{DateTime, Utc};

use crate::model::QuizSession;

/// Derived counters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub wrong: usize,
    pub unanswered: usize,
    pub accuracy_percent: u32,
    pub is_complete: bool,
}

impl SessionReport {
    #[must_use]
    pub fn from_session(session: &QuizSession) -> Self {
        let total = session.display_len();
        let answered = session.answered_count();
        let correct = session
            .answers()
            .iter()
            .flatten()
            .filter(|answer| answer.is_correct())
            .count();
        Self {
            total,
            answered,
            correct,
            wrong: answered - correct,
            unanswered: total - answered,
            accuracy_percent: accuracy_percent(correct, answered),
            is_complete: session.is_complete(),
        }
    }
}

/// `round(correct * 100 / answered)`, defined as `0` when nothing is
/// answered yet so the division never escapes as a NaN-like sentinel.
#[must_use]
pub fn accuracy_percent(correct: usize, answered: usize) -> u32 {
    if answered == 0 {
        return 0;
    }
    let ratio = correct as f64 * 100.0 / answered as f64;
    ratio.round() as u32
}

/// Whole seconds since the session started, floored, never negative.
#[must_use]
pub fn elapsed_seconds(session: &QuizSession, now: DateTime<Utc>) -> u64 {
    let seconds = now.signed_duration_since(session.started_at()).num_seconds();
    u64::try_from(seconds).unwrap_or(0)
}

/// Average whole seconds spent per answered question.
#[must_use]
pub fn average_answer_seconds(elapsed_seconds: u64, answered: usize) -> u64 {
    if answered == 0 {
        return 0;
    }
    let average = elapsed_seconds as f64 / answered as f64;
    average.round() as u64
}
