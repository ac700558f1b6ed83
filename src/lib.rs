//! Memory Leak match server - authoritative two-player RTS simulation
//!
//! Sessions connect over WebSocket, authenticate by username, queue for a
//! match and then stream commands into a per-match tick loop that owns the
//! whole world state.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod store;
pub mod util;
pub mod ws;
