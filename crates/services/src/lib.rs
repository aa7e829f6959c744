#![forbid(unsafe_code)]

pub mod error;
pub mod events;
pub mod loader;
pub mod player;

pub use quiz_core::Clock;

pub use error::{LoadError, PlayerError};
pub use events::{EventSink, NoopEventSink, QuizEvent};
pub use loader::{BankLoader, FixtureBankLoader, HttpBankLoader};
pub use player::{HistoryListItem, HistoryService, PlayerService, PlayerSession, SessionKind};
