//! Session types: the server's record of one connected player.

use arena_protocol::{PlayerId, ServerMessage};
use tokio::sync::mpsc;

use crate::SessionError;

/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Channel for delivering outbound messages to a player's writer task.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// The name every player starts with.
pub fn default_name(player_id: PlayerId) -> String {
    format!("Player_{}", player_id.0)
}

/// A connected player.
#[derive(Debug)]
pub struct Session {
    pub player_id: PlayerId,
    pub name: String,
    pub(crate) outbound: PlayerSender,
}

impl Session {
    /// Queues `msg` for this player.
    ///
    /// Returns `false` if the writer task is gone (the connection is
    /// closing); the caller is expected to carry on.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.outbound.send(msg).is_ok()
    }
}

/// Trims `raw` and checks it against the naming rules.
pub fn validate_name(raw: &str) -> Result<String, SessionError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SessionError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(SessionError::NameTooLong {
            max: MAX_NAME_CHARS,
        });
    }
    Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name() {
        assert_eq!(default_name(PlayerId(12)), "Player_12");
    }

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Ana  ").unwrap(), "Ana");
    }

    #[test]
    fn test_validate_name_rejects_blank() {
        assert!(matches!(validate_name("   "), Err(SessionError::EmptyName)));
    }

    #[test]
    fn test_validate_name_counts_chars_not_bytes() {
        let exact = "é".repeat(MAX_NAME_CHARS);
        assert!(validate_name(&exact).is_ok());
        let over = "a".repeat(MAX_NAME_CHARS + 1);
        assert!(matches!(
            validate_name(&over),
            Err(SessionError::NameTooLong { max: 32 })
        ));
    }
}
