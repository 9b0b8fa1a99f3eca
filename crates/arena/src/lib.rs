//! # Arena
//!
//! Real-time two-player rock-paper-scissors over WebSocket.
//!
//! Players connect, get a numeric id, and then create or join two-seat
//! rooms (optionally password protected). Once both occupants are ready a
//! round starts with a countdown; choices stay hidden until both are in or
//! the countdown runs out, at which point any missing choice is drawn at
//! random. Rooms keep lifetime scores and a best-of-N series.
//!
//! All game state lives in one lobby task (see [`lobby`]). Connection
//! handlers only decode frames and forward them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arena::prelude::*;
//!
//! # async fn demo() -> Result<(), ArenaError> {
//! let server = ArenaServer::builder()
//!     .bind("127.0.0.1:8082")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod lobby;
mod server;

pub use config::ServerConfig;
pub use error::ArenaError;
pub use lobby::{Lobby, LobbyHandle};
pub use server::{ArenaServer, ArenaServerBuilder};

pub mod prelude {
    pub use crate::{ArenaError, ArenaServer, ArenaServerBuilder, ServerConfig};
    pub use arena_protocol::{
        Choice, ClientMessage, GameState, Outcome, PlayerId, RoomId,
        RoomSnapshot, Score, SeriesSnapshot, ServerMessage,
    };
}
