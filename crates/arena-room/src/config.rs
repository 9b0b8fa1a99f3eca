//! Room configuration and state machine.

use std::fmt;

use arena_protocol::GameState;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room the registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomConfig {
    /// Series length. Always odd and at least 1 after [`Self::validated`].
    pub best_of: u32,
}

impl RoomConfig {
    /// Seats per room. Fixed: this is a two-player game.
    pub const CAPACITY: usize = 2;

    /// Default series length.
    pub const DEFAULT_BEST_OF: u32 = 3;

    /// Creates a config with the given series length, normalized.
    pub fn with_best_of(best_of: u32) -> Self {
        Self { best_of }.validated()
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// - `best_of == 0` becomes 1.
    /// - An even `best_of` is bumped to the next odd value.
    pub fn validated(mut self) -> Self {
        if self.best_of == 0 {
            tracing::warn!("best_of of 0 is meaningless, using 1");
            self.best_of = 1;
        } else if self.best_of % 2 == 0 {
            tracing::warn!(
                best_of = self.best_of,
                "best_of must be odd, rounding up"
            );
            self.best_of += 1;
        }
        self
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            best_of: Self::DEFAULT_BEST_OF,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
///            all seated players ready
///   Waiting ─────────────────────────→ Playing
///      ↑                                  │
///      └──── round resolved / player left ┘
/// ```
///
/// The result phase is not a state of its own: resolution is one atomic
/// step that records the outcome and lands back in `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Accepting joins and ready signals; choices are refused.
    Waiting,
    /// A round is live; choices are accepted, ready signals ignored.
    Playing,
}

impl RoomState {
    /// Returns `true` if the room accepts new players in this state.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if choices are accepted in this state.
    pub fn accepts_choices(self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl From<RoomState> for GameState {
    fn from(state: RoomState) -> Self {
        match state {
            RoomState::Waiting => GameState::Waiting,
            RoomState::Playing => GameState::Playing,
        }
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Playing => write!(f, "Playing"),
        }
    }
}
