//! Server configuration.

use std::time::Duration;

use arena_room::RoomConfig;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// How long a round may stay open before missing choices are
    /// auto-picked.
    pub round_timeout: Duration,
    /// Series length. Normalized to an odd value ≥ 1 by
    /// [`validated`](Self::validated).
    pub best_of: u32,
    /// Connections silent for this long are closed. Zero disables the
    /// cutoff.
    pub idle_timeout: Duration,
}

impl ServerConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "127.0.0.1:8082";
    pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Fixes out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        self.best_of = RoomConfig::with_best_of(self.best_of).best_of;
        self
    }

    /// The room settings derived from this config.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig::with_best_of(self.best_of)
    }

    /// The idle cutoff, or `None` when disabled.
    pub fn idle_cutoff(&self) -> Option<Duration> {
        (!self.idle_timeout.is_zero()).then_some(self.idle_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: Self::DEFAULT_BIND_ADDR.to_owned(),
            round_timeout: Self::DEFAULT_ROUND_TIMEOUT,
            best_of: RoomConfig::DEFAULT_BEST_OF,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }
}
