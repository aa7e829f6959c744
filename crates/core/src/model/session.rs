use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use thiserror::Error;

use crate::model::{AnswerRecord, Question, QuestionBank, SessionOrder, SubjectId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question bank has no questions")]
    EmptyBank,
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Plain-data capture of a session, the unit of persistence.
///
/// The bank itself is not part of the snapshot; it is re-fetched on resume
/// and the snapshot is only accepted when it still fits the fetched bank.
/// An empty `option_permutations` marks a snapshot written before option
/// shuffling existed; the tables are regenerated on resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current: usize,
    pub score: u32,
    pub answers: Vec<Option<AnswerRecord>>,
    pub viewed: Vec<bool>,
    pub length: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub question_permutation: Vec<usize>,
    pub option_permutations: Vec<Vec<usize>>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// The quiz session state machine.
///
/// Owns the cursor, the per-position answer records, the incremental score,
/// and the display ordering for one bank. All operations run synchronously
/// on a single caller thread; invalid inputs (out-of-range positions,
/// re-picks of an answered question) are silent no-ops rather than errors,
/// matching debounced UI callers.
#[derive(Clone)]
pub struct QuizSession {
    bank: QuestionBank,
    order: SessionOrder,
    current: usize,
    answers: Vec<Option<AnswerRecord>>,
    viewed: Vec<bool>,
    score: u32,
    started_at: DateTime<Utc>,
    bookmarks: Vec<usize>,
    submitted: bool,
}

impl QuizSession {
    /// Start a fresh session over the bank, shuffled or in authoring order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` if the bank has no questions.
    pub fn start<R: Rng + ?Sized>(
        bank: QuestionBank,
        shuffle: bool,
        rng: &mut R,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if bank.is_empty() {
            return Err(SessionError::EmptyBank);
        }
        let order = if shuffle {
            SessionOrder::shuffled(&bank, rng)
        } else {
            SessionOrder::identity(&bank)
        };
        Ok(Self::fresh(bank, order, started_at))
    }

    /// Reconstruct a session from a persisted snapshot.
    ///
    /// Returns `None` when the snapshot no longer fits the bank (length or
    /// order mismatch); mismatched snapshots are discarded whole, never
    /// partially repaired, and callers start a fresh session instead. Within an
    /// accepted snapshot the cursor is clamped into range, short arrays are
    /// padded, and the score is recomputed from the restored answers.
    pub fn resume<R: Rng + ?Sized>(
        bank: &QuestionBank,
        snapshot: SessionSnapshot,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if bank.is_empty()
            || snapshot.length != bank.len()
            || snapshot.question_permutation.len() != bank.len()
        {
            return None;
        }

        let order = if snapshot.option_permutations.is_empty() {
            SessionOrder::regenerate_options(bank, snapshot.question_permutation, rng)
        } else {
            SessionOrder::from_parts(snapshot.question_permutation, snapshot.option_permutations)
        };
        if !order.fits(bank) {
            return None;
        }

        let len = bank.len();
        let mut answers = snapshot.answers;
        answers.resize(len, None);
        let mut viewed = snapshot.viewed;
        viewed.resize(len, false);
        let score = count_correct(&answers);
        let current = snapshot.current.min(len - 1);

        let mut session = Self {
            bank: bank.clone(),
            order,
            current,
            answers,
            viewed,
            score,
            started_at: snapshot.started_at.unwrap_or(now),
            bookmarks: Vec::new(),
            submitted: false,
        };
        session.mark_viewed(session.current);
        Some(session)
    }

    fn fresh(bank: QuestionBank, order: SessionOrder, started_at: DateTime<Utc>) -> Self {
        let len = bank.len();
        let mut session = Self {
            bank,
            order,
            current: 0,
            answers: vec![None; len],
            viewed: vec![false; len],
            score: 0,
            started_at,
            bookmarks: Vec::new(),
            submitted: false,
        };
        session.mark_viewed(0);
        session
    }

    /// Attach the subject's persisted bookmarks. Positions beyond the
    /// display range are dropped.
    #[must_use]
    pub fn with_bookmarks(mut self, bookmarks: Vec<usize>) -> Self {
        let len = self.display_len();
        self.bookmarks = bookmarks;
        self.bookmarks.retain(|&position| position < len);
        self
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        self.bank.subject()
    }

    #[must_use]
    pub fn order(&self) -> &SessionOrder {
        &self.order
    }

    /// Number of display positions (equals the bank length).
    #[must_use]
    pub fn display_len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn current_position(&self) -> usize {
        self.current
    }

    /// The question shown at a display position.
    #[must_use]
    pub fn question_at(&self, position: usize) -> Option<&Question> {
        self.bank.question(self.order.bank_index(position)?)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.question_at(self.current)
    }

    #[must_use]
    pub fn answer(&self, position: usize) -> Option<&AnswerRecord> {
        self.answers.get(position)?.as_ref()
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<AnswerRecord>] {
        &self.answers
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().flatten().count()
    }

    /// True once every display position carries an answer. Orthogonal to
    /// `submitted`: callers decide what an incomplete submission means.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answers.iter().all(Option::is_some)
    }

    #[must_use]
    pub fn is_viewed(&self, position: usize) -> bool {
        self.viewed.get(position).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    #[must_use]
    pub fn bookmarks(&self) -> &[usize] {
        &self.bookmarks
    }

    #[must_use]
    pub fn is_bookmarked(&self, position: usize) -> bool {
        self.bookmarks.contains(&position)
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Record the user's pick of an option (original index) for a display
    /// position. First answer wins: re-picks, out-of-range positions,
    /// unknown option indices, and submitted sessions are silent no-ops.
    pub fn pick(&mut self, position: usize, option_index: usize) -> Option<&AnswerRecord> {
        if self.submitted || position >= self.answers.len() || self.answers[position].is_some() {
            return None;
        }
        let question = self.question_at(position)?;
        if option_index >= question.option_count() {
            return None;
        }
        let record = AnswerRecord::picked_option(option_index, question.correct_index());
        if record.is_correct() {
            self.score += 1;
        }
        self.answers[position] = Some(record);
        self.answers[position].as_ref()
    }

    /// Mark a position answered-correctly without a real user choice.
    /// No-op when the position is already answered, the session is
    /// submitted, or the question carries no correct option.
    pub fn reveal(&mut self, position: usize) -> Option<&AnswerRecord> {
        if self.submitted || position >= self.answers.len() || self.answers[position].is_some() {
            return None;
        }
        let correct = self.question_at(position)?.correct_index()?;
        self.answers[position] = Some(AnswerRecord::revealed(correct));
        self.score += 1;
        self.answers[position].as_ref()
    }

    /// Move the cursor by `delta`, clamped to the display range, marking
    /// the landing position viewed when it is unanswered.
    pub fn advance(&mut self, delta: i64) {
        if self.submitted {
            return;
        }
        let last = self.display_len() as i64 - 1;
        let target = (self.current as i64).saturating_add(delta).clamp(0, last);
        self.set_position(target as usize);
    }

    /// Jump straight to a display position (sidebar or bookmark
    /// navigation). Out-of-range positions are ignored.
    pub fn jump_to(&mut self, position: usize) {
        if self.submitted || position >= self.display_len() {
            return;
        }
        self.set_position(position);
    }

    /// Flag the caller's explicit finalization. Distinct from
    /// `is_complete`; only `restart` leaves the submitted state.
    pub fn submit(&mut self) {
        self.submitted = true;
    }

    /// Toggle a bookmark, returning whether the position is bookmarked
    /// after the call; `None` for out-of-range positions.
    pub fn toggle_bookmark(&mut self, position: usize) -> Option<bool> {
        if position >= self.display_len() {
            return None;
        }
        if let Some(found) = self.bookmarks.iter().position(|&p| p == position) {
            self.bookmarks.remove(found);
            Some(false)
        } else {
            self.bookmarks.push(position);
            Some(true)
        }
    }

    /// Build a wholly new session on the same bank: answers, viewed marks,
    /// score, cursor, and the submitted flag are dropped; the ordering is
    /// regenerated when `reshuffle` is set and carried over otherwise.
    /// Bookmarks survive; they are keyed to the subject, not the session.
    #[must_use]
    pub fn restart<R: Rng + ?Sized>(
        &self,
        reshuffle: bool,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Self {
        let order = if reshuffle {
            SessionOrder::shuffled(&self.bank, rng)
        } else {
            self.order.clone()
        };
        let mut next = Self::fresh(self.bank.clone(), order, now);
        next.bookmarks = self.bookmarks.clone();
        next
    }

    /// Derive an unshuffled session over the questions answered wrong, in
    /// the order the user encountered them. `None` when nothing was
    /// answered wrong.
    #[must_use]
    pub fn derive_wrong_only(&self, now: DateTime<Utc>) -> Option<Self> {
        let wrong: Vec<Question> = (0..self.display_len())
            .filter(|&position| {
                self.answers[position]
                    .as_ref()
                    .is_some_and(|answer| !answer.is_correct())
            })
            .filter_map(|position| self.question_at(position).cloned())
            .collect();
        if wrong.is_empty() {
            return None;
        }
        let bank = QuestionBank::new(self.bank.subject().clone(), wrong);
        let order = SessionOrder::identity(&bank);
        Some(Self::fresh(bank, order, now))
    }

    /// Capture the persistable portion of this session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current: self.current,
            score: self.score,
            answers: self.answers.clone(),
            viewed: self.viewed.clone(),
            length: self.display_len(),
            started_at: Some(self.started_at),
            question_permutation: self.order.question_permutation().to_vec(),
            option_permutations: self.order.option_permutations().to_vec(),
        }
    }

    fn set_position(&mut self, position: usize) {
        self.current = position;
        self.mark_viewed(position);
    }

    fn mark_viewed(&mut self, position: usize) {
        if self.answers[position].is_none() {
            self.viewed[position] = true;
        }
    }
}

fn count_correct(answers: &[Option<AnswerRecord>]) -> u32 {
    let count = answers
        .iter()
        .flatten()
        .filter(|answer| answer.is_correct())
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("subject", self.bank.subject())
            .field("display_len", &self.display_len())
            .field("current", &self.current)
            .field("answered", &self.answered_count())
            .field("score", &self.score)
            .field("started_at", &self.started_at)
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, SubjectId};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // Three options per question, the correct one at index `correct`.
    fn build_question(label: &str, correct: usize) -> Question {
        let options = (0..3)
            .map(|i| AnswerOption::new(format!("{label}-{i}"), i == correct))
            .collect();
        Question::new(label, options)
    }

    fn build_bank(n: usize) -> QuestionBank {
        let questions = (0..n).map(|i| build_question(&format!("q{i}"), 0)).collect();
        QuestionBank::new(SubjectId::new("t.json"), questions)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn start_plain(n: usize) -> QuizSession {
        QuizSession::start(build_bank(n), false, &mut rng(), fixed_now()).unwrap()
    }

    #[test]
    fn start_rejects_empty_bank() {
        let bank = QuestionBank::new(SubjectId::new("t.json"), Vec::new());
        let err = QuizSession::start(bank, true, &mut rng(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::EmptyBank);
    }

    #[test]
    fn start_marks_first_position_viewed() {
        let session = start_plain(3);
        assert!(session.is_viewed(0));
        assert!(!session.is_viewed(1));
        assert_eq!(session.current_position(), 0);
    }

    #[test]
    fn first_answer_wins() {
        let mut session = start_plain(2);
        let first = session.pick(0, 1).copied().unwrap();
        assert!(!first.is_correct());

        // Second pick on the same position changes nothing.
        assert!(session.pick(0, 0).is_none());
        assert_eq!(session.answer(0), Some(&first));
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn pick_ignores_invalid_input() {
        let mut session = start_plain(2);
        assert!(session.pick(9, 0).is_none());
        assert!(session.pick(0, 9).is_none());
        assert_eq!(session.answered_count(), 0);
    }

    #[test]
    fn pick_scores_correct_answers() {
        let mut session = start_plain(3);
        session.pick(0, 0);
        session.pick(1, 2);
        assert_eq!(session.score(), 1);
        assert_eq!(session.answered_count(), 2);
        assert!(!session.is_complete());
        session.pick(2, 0);
        assert!(session.is_complete());
        assert_eq!(session.score(), 2);
    }

    #[test]
    fn reveal_counts_as_correct_once() {
        let mut session = start_plain(2);
        let revealed = session.reveal(1).copied().unwrap();
        assert!(revealed.is_correct());
        assert_eq!(revealed.picked(), 0);
        assert_eq!(session.score(), 1);

        assert!(session.reveal(1).is_none());
        assert!(session.pick(1, 2).is_none());
        assert_eq!(session.score(), 1);
    }

    #[test]
    fn reveal_without_correct_option_is_noop() {
        let question = Question::new(
            "broken",
            vec![AnswerOption::new("a", false), AnswerOption::new("b", false)],
        );
        let bank = QuestionBank::new(SubjectId::new("t.json"), vec![question]);
        let mut session = QuizSession::start(bank, false, &mut rng(), fixed_now()).unwrap();

        assert!(session.reveal(0).is_none());
        assert_eq!(session.answered_count(), 0);

        // A real pick on the broken question records, but never scores.
        let record = session.pick(0, 1).copied().unwrap();
        assert!(!record.is_correct());
        assert_eq!(record.correct(), None);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn score_equals_correct_answer_count_after_mixed_operations() {
        let mut session = start_plain(4);
        session.pick(0, 0);
        session.pick(1, 1);
        session.reveal(2);
        session.pick(3, 0);
        let recount = session
            .answers()
            .iter()
            .flatten()
            .filter(|a| a.is_correct())
            .count();
        assert_eq!(session.score() as usize, recount);
        assert_eq!(session.score(), 3);

        let restarted = session.restart(false, &mut rng(), fixed_now());
        assert_eq!(restarted.score(), 0);
        assert_eq!(restarted.answered_count(), 0);
    }

    #[test]
    fn advance_clamps_at_both_ends() {
        let mut session = start_plain(3);
        session.advance(-1);
        assert_eq!(session.current_position(), 0);
        session.advance(1);
        assert_eq!(session.current_position(), 1);
        assert!(session.is_viewed(1));
        session.advance(10);
        assert_eq!(session.current_position(), 2);
        session.advance(1);
        assert_eq!(session.current_position(), 2);
    }

    #[test]
    fn jump_ignores_out_of_range_positions() {
        let mut session = start_plain(3);
        session.jump_to(2);
        assert_eq!(session.current_position(), 2);
        session.jump_to(7);
        assert_eq!(session.current_position(), 2);
    }

    #[test]
    fn viewed_is_not_set_on_answered_positions() {
        let mut session = start_plain(3);
        session.pick(1, 0);
        session.jump_to(1);
        assert!(!session.is_viewed(1));
    }

    #[test]
    fn restart_without_reshuffle_keeps_order() {
        let mut session =
            QuizSession::start(build_bank(5), true, &mut rng(), fixed_now()).unwrap();
        session.pick(0, 0);
        session.advance(2);
        session.toggle_bookmark(3);

        let restarted = session.restart(false, &mut rng(), fixed_now());
        assert_eq!(restarted.order(), session.order());
        assert_eq!(restarted.current_position(), 0);
        assert_eq!(restarted.score(), 0);
        assert_eq!(restarted.answered_count(), 0);
        assert!(!restarted.is_viewed(2));
        assert_eq!(restarted.bookmarks(), &[3]);
    }

    #[test]
    fn restart_with_reshuffle_regenerates_order() {
        let session = QuizSession::start(build_bank(30), true, &mut rng(), fixed_now()).unwrap();
        let mut reshuffle_rng = StdRng::seed_from_u64(99);
        let restarted = session.restart(true, &mut reshuffle_rng, fixed_now());
        assert!(restarted.order().fits(restarted.bank()));
        // 30 elements make an accidental identical order implausible.
        assert_ne!(restarted.order(), session.order());
    }

    #[test]
    fn submit_freezes_everything_but_restart() {
        let mut session = start_plain(3);
        session.pick(0, 0);
        session.submit();
        assert!(session.is_submitted());

        assert!(session.pick(1, 0).is_none());
        assert!(session.reveal(2).is_none());
        session.advance(1);
        session.jump_to(2);
        assert_eq!(session.current_position(), 0);

        let restarted = session.restart(false, &mut rng(), fixed_now());
        assert!(!restarted.is_submitted());
    }

    #[test]
    fn wrong_only_session_preserves_display_order() {
        let mut session = start_plain(4);
        session.pick(0, 0); // right
        session.pick(1, 1); // wrong
        session.pick(2, 2); // wrong
        session.pick(3, 0); // right

        let review = session.derive_wrong_only(fixed_now()).unwrap();
        assert_eq!(review.display_len(), 2);
        assert_eq!(review.question_at(0).unwrap().text(), "q1");
        assert_eq!(review.question_at(1).unwrap().text(), "q2");
        assert_eq!(review.order(), &SessionOrder::identity(review.bank()));
    }

    #[test]
    fn wrong_only_follows_display_order_under_shuffle() {
        let bank = build_bank(3);
        let order = SessionOrder::from_parts(
            vec![2, 1, 0],
            vec![vec![0, 1, 2], vec![0, 1, 2], vec![0, 1, 2]],
        );
        assert!(order.fits(&bank));
        let snapshot = SessionSnapshot {
            current: 0,
            score: 0,
            answers: vec![None; 3],
            viewed: vec![false; 3],
            length: 3,
            started_at: Some(fixed_now()),
            question_permutation: order.question_permutation().to_vec(),
            option_permutations: order.option_permutations().to_vec(),
        };
        let mut session =
            QuizSession::resume(&bank, snapshot, &mut rng(), fixed_now()).unwrap();
        session.pick(0, 1); // displays q2, wrong
        session.pick(1, 0); // displays q1, right
        session.pick(2, 1); // displays q0, wrong

        let review = session.derive_wrong_only(fixed_now()).unwrap();
        assert_eq!(review.display_len(), 2);
        assert_eq!(review.question_at(0).unwrap().text(), "q2");
        assert_eq!(review.question_at(1).unwrap().text(), "q0");
    }

    #[test]
    fn wrong_only_is_none_without_wrong_answers() {
        let mut session = start_plain(2);
        session.pick(0, 0);
        session.reveal(1);
        assert!(session.derive_wrong_only(fixed_now()).is_none());
    }

    #[test]
    fn snapshot_round_trip_restores_the_session() {
        let mut session =
            QuizSession::start(build_bank(5), true, &mut rng(), fixed_now()).unwrap();
        session.pick(0, 0);
        session.pick(1, 1);
        session.advance(3);

        let snapshot = session.snapshot();
        let resumed =
            QuizSession::resume(session.bank(), snapshot, &mut rng(), fixed_now()).unwrap();

        assert_eq!(resumed.current_position(), session.current_position());
        assert_eq!(resumed.answers(), session.answers());
        assert_eq!(resumed.score(), session.score());
        assert_eq!(resumed.order(), session.order());
        assert_eq!(resumed.started_at(), session.started_at());
    }

    #[test]
    fn resume_discards_snapshots_for_a_different_length() {
        let mut session = start_plain(3);
        session.pick(0, 0);
        let snapshot = session.snapshot();

        let grown = build_bank(4);
        assert!(QuizSession::resume(&grown, snapshot, &mut rng(), fixed_now()).is_none());
    }

    #[test]
    fn resume_discards_orders_that_do_not_fit() {
        let session = start_plain(3);
        let mut snapshot = session.snapshot();
        snapshot.question_permutation = vec![0, 0, 2];
        assert!(
            QuizSession::resume(session.bank(), snapshot, &mut rng(), fixed_now()).is_none()
        );
    }

    #[test]
    fn resume_clamps_the_cursor_and_pads_arrays() {
        let session = start_plain(3);
        let mut snapshot = session.snapshot();
        snapshot.current = 12;
        snapshot.answers.truncate(1);
        snapshot.viewed.truncate(1);

        let resumed =
            QuizSession::resume(session.bank(), snapshot, &mut rng(), fixed_now()).unwrap();
        assert_eq!(resumed.current_position(), 2);
        assert_eq!(resumed.display_len(), 3);
    }

    #[test]
    fn resume_recomputes_the_score() {
        let mut session = start_plain(3);
        session.pick(0, 0);
        let mut snapshot = session.snapshot();
        snapshot.score = 99;

        let resumed =
            QuizSession::resume(session.bank(), snapshot, &mut rng(), fixed_now()).unwrap();
        assert_eq!(resumed.score(), 1);
    }

    #[test]
    fn resume_regenerates_missing_option_tables() {
        let session = start_plain(3);
        let mut snapshot = session.snapshot();
        snapshot.option_permutations = Vec::new();

        let resumed =
            QuizSession::resume(session.bank(), snapshot, &mut rng(), fixed_now()).unwrap();
        assert_eq!(
            resumed.order().question_permutation(),
            session.order().question_permutation()
        );
        assert!(resumed.order().fits(resumed.bank()));
    }

    #[test]
    fn resume_defaults_missing_start_time_to_now() {
        let session = start_plain(2);
        let mut snapshot = session.snapshot();
        snapshot.started_at = None;

        let later = fixed_now() + chrono::Duration::minutes(5);
        let resumed = QuizSession::resume(session.bank(), snapshot, &mut rng(), later).unwrap();
        assert_eq!(resumed.started_at(), later);
    }

    #[test]
    fn bookmarks_toggle_and_drop_out_of_range() {
        let mut session = start_plain(3);
        assert_eq!(session.toggle_bookmark(1), Some(true));
        assert_eq!(session.toggle_bookmark(2), Some(true));
        assert_eq!(session.toggle_bookmark(1), Some(false));
        assert_eq!(session.toggle_bookmark(9), None);
        assert_eq!(session.bookmarks(), &[2]);
        assert!(session.is_bookmarked(2));

        let session = session.with_bookmarks(vec![0, 5, 2]);
        assert_eq!(session.bookmarks(), &[0, 2]);
    }
}
