//! WebSocket sessions and the client/server packet protocol

pub mod handler;
pub mod protocol;
pub mod session;

pub use handler::ws_handler;
pub use protocol::{ClientMsg, ErrorCode, ServerMsg};
pub use session::{SessionDirectory, SessionIdentity};
