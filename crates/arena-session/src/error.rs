//! Error types for the session layer.

use arena_protocol::PlayerId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player. Either they never
    /// connected or their session was already torn down.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// A rename to an empty (or all-whitespace) name.
    #[error("name cannot be empty")]
    EmptyName,

    /// A rename past the length cap.
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
}
