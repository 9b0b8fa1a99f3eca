//! Player identity registry for the arena server.
//!
//! Every accepted connection becomes a [`Session`]: a process-unique
//! [`PlayerId`](arena_protocol::PlayerId), a display name, and the
//! outbound channel the connection's writer task drains.
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby (above)  ← resolves names and fans out ServerMessages
//!     ↕
//! Session Layer (this crate)  ← who is connected and how to reach them
//!     ↕
//! Protocol Layer (below)  ← PlayerId, ServerMessage
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{
    MAX_NAME_CHARS, PlayerSender, Session, default_name, validate_name,
};
