//! Two-player matchmaking

pub mod queue;
pub mod service;

pub use queue::{MatchmakingQueue, QueuedSession};
pub use service::{JoinOutcome, MatchmakingError, MatchmakingService};
