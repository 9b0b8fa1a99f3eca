//! Error types for the room layer.
//!
//! The `Display` text of every variant is shown to the requesting player
//! verbatim, so it is phrased for them.

use arena_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {} does not exist", .0.as_str())]
    NotFound(RoomId),

    /// Both seats are taken.
    #[error("room is full ({0}/{0} players)")]
    RoomFull(usize),

    /// The player already sits in a room.
    #[error("you are already in a room; leave it first")]
    AlreadyInRoom(RoomId),

    /// The player does not sit in any room.
    #[error("you are not in a room")]
    NotInRoom,

    /// The room is password protected and the attempt did not match.
    #[error("incorrect room password")]
    WrongPassword,

    /// The player already locked in a choice this round.
    #[error("you have already chosen this round")]
    AlreadyChose,

    /// Another occupant already goes by this display name.
    #[error("the name {0} is already taken in this room")]
    NameTaken(String),

    /// The room is in a state that doesn't allow this operation.
    #[error("{0}")]
    InvalidState(String),
}
