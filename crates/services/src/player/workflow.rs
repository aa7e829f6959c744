use std::sync::Arc;

use tracing::{debug, warn};

use quiz_core::Clock;
use quiz_core::model::{AnswerRecord, QuestionBank, QuizSession, SessionSnapshot, SubjectId};
use quiz_core::report::{self, SessionReport};
use storage::repository::{
    BookmarkRepository, HistoryEntry, HistoryRepository, PlayerSettingsRepository,
    SnapshotRecord, SnapshotRepository, Storage,
};

use crate::error::PlayerError;
use crate::events::{EventSink, NoopEventSink, QuizEvent, anonymous_player_id};
use crate::loader::BankLoader;

/// Whether a session plays a full subject bank or a derived review subset.
///
/// Review sessions are ephemeral: they share their parent's subject key and
/// therefore never write snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Subject,
    Review,
}

/// A live session plus the policy needed to drive it.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    session: QuizSession,
    kind: SessionKind,
}

impl PlayerSession {
    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    #[must_use]
    pub fn report(&self) -> SessionReport {
        SessionReport::from_session(&self.session)
    }
}

/// Orchestrates bank loading, the session state machine, persistence, and
/// event reporting.
///
/// One instance serves the whole player. Sessions are owned by the caller
/// (the rendering layer) and passed back into each operation; every
/// successful mutation is followed by a snapshot write, and failed writes
/// are logged and swallowed so the in-memory state never rolls back behind
/// the user.
#[derive(Clone)]
pub struct PlayerService {
    clock: Clock,
    loader: Arc<dyn BankLoader>,
    snapshots: Arc<dyn SnapshotRepository>,
    bookmarks: Arc<dyn BookmarkRepository>,
    history: Arc<dyn HistoryRepository>,
    settings: Arc<dyn PlayerSettingsRepository>,
    events: Arc<dyn EventSink>,
    player_id: String,
    shuffle: bool,
}

impl PlayerService {
    #[must_use]
    pub fn new(clock: Clock, loader: Arc<dyn BankLoader>, storage: Storage) -> Self {
        Self {
            clock,
            loader,
            snapshots: storage.snapshots,
            bookmarks: storage.bookmarks,
            history: storage.history,
            settings: storage.settings,
            events: Arc::new(NoopEventSink),
            player_id: anonymous_player_id(),
            shuffle: true,
        }
    }

    /// Enable or disable question/option shuffling for fresh sessions.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Attach an event sink and the anonymous player id it is keyed by.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>, player_id: impl Into<String>) -> Self {
        self.events = events;
        self.player_id = player_id.into();
        self
    }

    /// Make `subject` the active subject and start (or resume) its session.
    ///
    /// The subject is recorded as active before the bank fetch, so a slow
    /// response for a subject the user has already navigated away from is
    /// detected afterwards and discarded rather than applied.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::StaleSubject` when another switch superseded
    /// this one mid-load, and load failures otherwise.
    pub async fn switch_subject(&self, subject: &SubjectId) -> Result<PlayerSession, PlayerError> {
        let previous = self.active_subject().await;
        if let Some(previous) = previous.filter(|previous| previous != subject) {
            self.events.emit(
                &self.player_id,
                QuizEvent::SubjectSwitch {
                    from: previous,
                    to: subject.clone(),
                },
            );
        }
        if let Err(err) = self.settings.set_active_subject(subject).await {
            warn!(subject = %subject, error = %err, "failed to record active subject");
        }

        let bank = self.loader.load(subject).await?;

        // A second switch may have landed while the fetch was in flight.
        let active = self.active_subject().await;
        if active.as_ref() != Some(subject) {
            debug!(subject = %subject, "discarding bank for superseded subject");
            return Err(PlayerError::StaleSubject);
        }

        let snapshot = self.load_snapshot(subject).await;
        let bookmarks = self.load_bookmarks(subject).await;
        let (session, was_resumed) = self.build_session(bank, snapshot)?;
        let session = session.with_bookmarks(bookmarks);

        let player = PlayerSession {
            session,
            kind: SessionKind::Subject,
        };
        self.persist(&player).await;

        if !was_resumed {
            self.events.emit(
                &self.player_id,
                QuizEvent::QuizStart {
                    subject: subject.clone(),
                    total: player.session.display_len(),
                },
            );
        }
        Ok(player)
    }

    /// Record a pick and persist. Invalid picks are silent no-ops and
    /// nothing is written for them.
    pub async fn pick(
        &self,
        player: &mut PlayerSession,
        position: usize,
        option_index: usize,
    ) -> Option<AnswerRecord> {
        let recorded = player.session.pick(position, option_index).copied();
        if let Some(record) = recorded {
            self.events.emit(
                &self.player_id,
                QuizEvent::Answer {
                    subject: player.session.subject().clone(),
                    position,
                    is_correct: record.is_correct(),
                    elapsed_seconds: report::elapsed_seconds(&player.session, self.clock.now()),
                },
            );
            self.persist(player).await;
        }
        recorded
    }

    /// Reveal the correct answer for a position and persist.
    pub async fn reveal(&self, player: &mut PlayerSession, position: usize) -> Option<AnswerRecord> {
        let recorded = player.session.reveal(position).copied();
        if recorded.is_some() {
            self.persist(player).await;
        }
        recorded
    }

    /// Move the cursor and persist when it actually moved.
    pub async fn advance(&self, player: &mut PlayerSession, delta: i64) {
        let before = player.session.current_position();
        player.session.advance(delta);
        if player.session.current_position() != before {
            self.persist(player).await;
        }
    }

    /// Jump to a display position and persist when it actually moved.
    pub async fn jump_to(&self, player: &mut PlayerSession, position: usize) {
        let before = player.session.current_position();
        player.session.jump_to(position);
        if player.session.current_position() != before {
            self.persist(player).await;
        }
    }

    /// Replace the session with a restarted one and persist the reset.
    pub async fn restart(&self, player: &mut PlayerSession, reshuffle: bool) {
        player.session = self.restarted(&player.session, reshuffle);
        self.persist(player).await;
    }

    /// Toggle a bookmark and persist the subject's bookmark list. Returns
    /// whether the position is bookmarked after the call.
    pub async fn toggle_bookmark(&self, player: &mut PlayerSession, position: usize) -> bool {
        let Some(bookmarked) = player.session.toggle_bookmark(position) else {
            return false;
        };
        if bookmarked {
            self.events.emit(
                &self.player_id,
                QuizEvent::BookmarkAdded {
                    subject: player.session.subject().clone(),
                    position,
                },
            );
        }
        let subject = player.session.subject().clone();
        if let Err(err) = self
            .bookmarks
            .save_bookmarks(&subject, player.session.bookmarks())
            .await
        {
            warn!(subject = %subject, error = %err, "bookmark write failed");
        }
        bookmarked
    }

    /// Finalize the session: flag it submitted, append a history entry for
    /// subject sessions, and report completion. Returns the final report.
    pub async fn submit(&self, player: &mut PlayerSession) -> SessionReport {
        player.session.submit();
        let now = self.clock.now();
        let session_report = player.report();
        let elapsed = report::elapsed_seconds(&player.session, now);
        self.persist(player).await;

        let subject = player.session.subject().clone();
        if player.kind == SessionKind::Subject {
            let entry = HistoryEntry {
                recorded_at: now,
                subject: subject.clone(),
                total: session_report.total,
                answered: session_report.answered,
                correct: session_report.correct,
                wrong: session_report.wrong,
                elapsed_seconds: elapsed,
                accuracy_percent: session_report.accuracy_percent,
            };
            if let Err(err) = self.history.append_history(&entry).await {
                warn!(subject = %subject, error = %err, "history write failed");
            }
        }

        self.events.emit(
            &self.player_id,
            QuizEvent::QuizComplete {
                subject,
                total: session_report.total,
                answered: session_report.answered,
                correct: session_report.correct,
                accuracy_percent: session_report.accuracy_percent,
                elapsed_seconds: elapsed,
            },
        );
        session_report
    }

    /// Derive an ephemeral session over the questions answered wrong, in
    /// the order the user encountered them. `None` when nothing was wrong.
    #[must_use]
    pub fn review_wrong(&self, player: &PlayerSession) -> Option<PlayerSession> {
        let session = player.session.derive_wrong_only(self.clock.now())?;
        Some(PlayerSession {
            session,
            kind: SessionKind::Review,
        })
    }

    /// Report that a hint was shown; display itself belongs to the
    /// rendering layer, only the event crosses this boundary.
    pub fn hint_shown(&self, player: &PlayerSession, position: usize) {
        self.events.emit(
            &self.player_id,
            QuizEvent::HintShown {
                subject: player.session.subject().clone(),
                position,
            },
        );
    }

    // The thread-local rng is !Send, so it stays inside these synchronous
    // helpers and never crosses an await point.
    fn build_session(
        &self,
        bank: QuestionBank,
        snapshot: Option<SessionSnapshot>,
    ) -> Result<(QuizSession, bool), PlayerError> {
        let now = self.clock.now();
        let mut rng = rand::rng();
        if let Some(session) =
            snapshot.and_then(|snapshot| QuizSession::resume(&bank, snapshot, &mut rng, now))
        {
            return Ok((session, true));
        }
        let session = QuizSession::start(bank, self.shuffle, &mut rng, now)?;
        Ok((session, false))
    }

    fn restarted(&self, session: &QuizSession, reshuffle: bool) -> QuizSession {
        let mut rng = rand::rng();
        session.restart(reshuffle, &mut rng, self.clock.now())
    }

    async fn active_subject(&self) -> Option<SubjectId> {
        match self.settings.active_subject().await {
            Ok(subject) => subject,
            Err(err) => {
                warn!(error = %err, "failed to read active subject");
                None
            }
        }
    }

    async fn load_snapshot(&self, subject: &SubjectId) -> Option<SessionSnapshot> {
        match self.snapshots.load_snapshot(subject).await {
            Ok(Some(record)) => match record.into_snapshot() {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(subject = %subject, error = %err, "ignoring corrupt snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(subject = %subject, error = %err, "snapshot read failed");
                None
            }
        }
    }

    async fn load_bookmarks(&self, subject: &SubjectId) -> Vec<usize> {
        match self.bookmarks.load_bookmarks(subject).await {
            Ok(positions) => positions,
            Err(err) => {
                warn!(subject = %subject, error = %err, "bookmark read failed");
                Vec::new()
            }
        }
    }

    async fn persist(&self, player: &PlayerSession) {
        if player.kind == SessionKind::Review {
            return;
        }
        let record = SnapshotRecord::from_snapshot(&player.session.snapshot());
        let subject = player.session.subject();
        if let Err(err) = self.snapshots.save_snapshot(subject, &record).await {
            warn!(subject = %subject, error = %err, "snapshot write failed");
        }
    }
}
