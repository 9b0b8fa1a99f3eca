//! Inbound and outbound message enums.
//!
//! Both are internally tagged on `type` with snake_case names, so a frame
//! looks like `{"type":"join_room","room_id":"a1b2c3d4"}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    Choice, Outcome, PlayerId, RoomId, RoomSnapshot, Score, SeriesSnapshot,
};

/// Client → server requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the current room list.
    GetRooms,

    /// Create a room and sit in it.
    CreateRoom {
        #[serde(default)]
        room_name: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },

    /// Sit in an existing room.
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        password: Option<String>,
    },

    LeaveRoom,

    /// Signal readiness for the next round.
    Ready,

    /// Submit this round's hand sign.
    Choice { choice: Choice },

    /// Ready again after a result (rematch / next round of a series).
    NewGame,

    SetName { name: String },

    Chat { message: String },

    /// Liveness check; `t` is echoed back in the `pong`.
    Ping {
        #[serde(default)]
        t: Option<u64>,
    },
}

impl ClientMessage {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetRooms => "get_rooms",
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::Ready => "ready",
            Self::Choice { .. } => "choice",
            Self::NewGame => "new_game",
            Self::SetName { .. } => "set_name",
            Self::Chat { .. } => "chat",
            Self::Ping { .. } => "ping",
        }
    }
}

/// Server → client notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once, right after the connection is accepted.
    #[serde(rename = "player_id")]
    Welcome { player_id: PlayerId },

    RoomsList { rooms: Vec<RoomSnapshot> },

    /// Sent to the creator only.
    RoomCreated { room: RoomSnapshot },

    PlayerJoined { player_name: String, room: RoomSnapshot },

    PlayerLeft { player_name: String, room: RoomSnapshot },

    PlayerReady { player_name: String, room: RoomSnapshot },

    GameStart {
        room: RoomSnapshot,
        is_first_game: bool,
        both_ready: bool,
        series: SeriesSnapshot,
    },

    /// Someone locked in a choice; the choice itself stays hidden.
    PlayerChose { player_name: String },

    /// Round adjudication. `choices`, `results`, and `scores` are keyed by
    /// display name.
    GameResult {
        choices: BTreeMap<String, Choice>,
        results: BTreeMap<String, Outcome>,
        scores: BTreeMap<String, Score>,
        series: SeriesSnapshot,
    },

    RoomUpdated { room: RoomSnapshot },

    PlayerReadyForNewGame { player_name: String, room: RoomSnapshot },

    PlayerRenamed { player_name: String, room: RoomSnapshot },

    Chat { player_name: String, message: String },

    Pong { t: u64 },

    /// Sent only to the requester whose operation was refused.
    Error { message: String },
}

impl ServerMessage {
    /// Shorthand for an [`ServerMessage::Error`].
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
