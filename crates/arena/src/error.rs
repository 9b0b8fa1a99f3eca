//! Unified error type for the arena server.

use arena_protocol::ProtocolError;
use arena_room::RoomError;
use arena_session::SessionError;
use arena_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown player, bad name).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, wrong password, bad state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The peer did not finish the WebSocket upgrade in time.
    #[error("websocket handshake from {0} timed out")]
    HandshakeTimeout(std::net::SocketAddr),

    /// A well-formed request with an unacceptable payload.
    #[error("{0}")]
    InvalidRequest(String),

    /// The lobby task has stopped; the server is shutting down.
    #[error("lobby is no longer running")]
    LobbyUnavailable,
}

impl ArenaError {
    /// Returns `true` if the error was caused by the requester and its text
    /// should be sent back to them as an `error` message.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Session(_) | Self::Room(_) | Self::InvalidRequest(_)
        )
    }
}
