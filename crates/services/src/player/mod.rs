mod view;
mod workflow;

// Public API of the player subsystem.
pub use view::{HistoryListItem, HistoryService};
pub use workflow::{PlayerService, PlayerSession, SessionKind};
