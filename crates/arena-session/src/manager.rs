//! The session manager: tracks every connected player.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself: it uses a plain
//! `HashMap`. The lobby task owns it exclusively and every access happens
//! on that one task.

use std::collections::HashMap;

use arena_protocol::{PlayerId, ServerMessage};
use tracing::{debug, info};

use crate::session::validate_name;
use crate::{PlayerSender, Session, SessionError, default_name};

/// Registry of connected players.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ [Connected] ──→ rename() ... ──→ disconnect()
/// ```
///
/// Ids are issued from a counter owned by the manager, starting at 1 and
/// never reused for the life of the manager.
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    next_id: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a new connection and returns its player id.
    ///
    /// The player starts as `Player_<id>`.
    pub fn connect(&mut self, outbound: PlayerSender) -> PlayerId {
        let player_id = PlayerId(self.next_id);
        self.next_id += 1;

        let session = Session {
            player_id,
            name: default_name(player_id),
            outbound,
        };
        self.sessions.insert(player_id, session);

        info!(%player_id, "session created");
        player_id
    }

    /// Tears down a session and returns it.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session exists, which
    /// makes a second disconnect for the same player detectable.
    pub fn disconnect(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        info!(%player_id, name = %session.name, "session closed");
        Ok(session)
    }

    /// Changes a player's display name.
    ///
    /// The name is trimmed first. Returns the stored name.
    ///
    /// # Errors
    /// `EmptyName` / `NameTooLong` for names that break the rules,
    /// `NotFound` for an unknown player.
    pub fn rename(
        &mut self,
        player_id: PlayerId,
        raw: &str,
    ) -> Result<&str, SessionError> {
        let name = validate_name(raw)?;
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        info!(%player_id, old = %session.name, new = %name, "player renamed");
        session.name = name;
        Ok(&session.name)
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.sessions.contains_key(&player_id)
    }

    /// Display name for `player_id`, or the default name if the player is
    /// unknown.
    pub fn name_of(&self, player_id: PlayerId) -> String {
        self.sessions
            .get(&player_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| default_name(player_id))
    }

    /// Queues `msg` for one player. A missing or closing recipient is
    /// logged and skipped.
    pub fn send(&self, player_id: PlayerId, msg: ServerMessage) {
        match self.sessions.get(&player_id) {
            Some(session) => {
                if !session.send(msg) {
                    debug!(%player_id, "outbound channel closed, message dropped");
                }
            }
            None => debug!(%player_id, "no session, message dropped"),
        }
    }

    /// Queues `msg` for each listed player. One failed recipient never
    /// stops delivery to the rest.
    pub fn send_to(&self, players: &[PlayerId], msg: &ServerMessage) {
        for player_id in players {
            self.send(*player_id, msg.clone());
        }
    }

    /// Queues `msg` for every connected player.
    pub fn broadcast(&self, msg: &ServerMessage) {
        for session in self.sessions.values() {
            if !session.send(msg.clone()) {
                debug!(
                    player_id = %session.player_id,
                    "outbound channel closed, broadcast skipped"
                );
            }
        }
    }

    /// Returns the number of connected players.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
