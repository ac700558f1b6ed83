//! Game simulation modules

pub mod abilities;
pub mod ai;
pub mod catalog;
pub mod combat;
pub mod commands;
pub mod economy;
pub mod entity;
pub mod r#match;
pub mod movement;
pub mod production;
pub mod snapshot;
pub mod world;

pub use commands::{CommandKind, CommandRejection, GameCommand};
pub use entity::{EntityId, PlayerId};
pub use r#match::{GameMatch, MatchHandle, MatchInput, MatchPhase, MatchRegistry};
pub use world::{EndReason, MatchOutcome, World};
