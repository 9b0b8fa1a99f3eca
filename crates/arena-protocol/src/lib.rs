//! Wire protocol for the arena rock-paper-scissors server.
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`Choice`], [`Outcome`],
//!   [`RoomSnapshot`], [`SeriesSnapshot`], ...): the data shapes shared by
//!   the room engine and the wire.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): every frame is a
//!   JSON object with a mandatory `type` discriminator.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): frames to/from bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Lobby → Room
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, ServerMessage};
pub use types::{
    Choice, GameState, Outcome, PlayerId, PlayerSummary, RoomId,
    RoomSnapshot, Score, SeriesSnapshot,
};
