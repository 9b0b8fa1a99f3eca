//! Room and match lifecycle engine.
//!
//! Everything here is plain synchronous state. The server owns a single
//! [`RoomRegistry`] and mutates it from one serialized task, so no type in
//! this crate needs locking.
//!
//! # Key types
//!
//! - [`resolve`]: adjudicates one round of simultaneous choices
//! - [`Series`]: best-of-N accumulator
//! - [`Room`]: roster, readiness, choices, scores, and the
//!   WAITING → PLAYING → WAITING state machine
//! - [`RoomRegistry`]: owns every room and the player → room index

mod config;
mod error;
mod registry;
mod resolver;
mod room;
mod series;

pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use registry::{Departure, MAX_ROOM_NAME_CHARS, RoomRegistry};
pub use resolver::resolve;
pub use room::{
    ChoiceProgress, ReadyProgress, Room, RoundResult, hash_password,
};
pub use series::{Series, threshold};
