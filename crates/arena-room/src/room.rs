//! A single two-seat room: roster, readiness, choices, scores, and series.

use std::collections::{HashMap, HashSet};

use arena_protocol::{
    Choice, Outcome, PlayerId, PlayerSummary, RoomId, RoomSnapshot, Score,
    SeriesSnapshot,
};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{RoomConfig, RoomError, RoomState, Series, resolve};

/// Hex-encoded SHA-256 of `"{room_id}:{password}"`.
///
/// Salting with the room id means two rooms sharing a password do not share
/// a hash.
pub fn hash_password(room_id: &RoomId, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(room_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// What [`Room::mark_ready`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyProgress {
    /// A round is already live; the signal was dropped.
    Ignored,
    /// Recorded, still waiting on other players (or on a second player).
    Waiting,
    /// Everyone is ready and the room moved to `Playing`.
    Started {
        /// `true` when no round has ever been recorded in this room.
        is_first_game: bool,
    },
}

/// What [`Room::submit_choice`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceProgress {
    /// Recorded; other players still have to choose.
    Pending,
    /// Recorded, and every seated player has now chosen.
    Complete,
}

/// Outcome of [`Room::resolve_round`].
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// Choices as they stood at resolution, including auto-picked ones.
    pub choices: HashMap<PlayerId, Choice>,
    pub outcomes: HashMap<PlayerId, Outcome>,
    /// Set when this round ended the series.
    pub series_winner: Option<PlayerId>,
}

/// One room. Capacity is always [`RoomConfig::CAPACITY`].
///
/// All mutation goes through methods that keep these invariants:
///
/// - `players.len() <= CAPACITY`
/// - `ready` and `choices` only ever name seated players
/// - `choices` is non-empty only while `Playing`
/// - the series tracks exactly the seated players
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    password_hash: Option<String>,
    state: RoomState,
    players: Vec<PlayerId>,
    ready: HashSet<PlayerId>,
    choices: HashMap<PlayerId, Choice>,
    scores: HashMap<PlayerId, Score>,
    series: Series,
}

impl Room {
    /// Creates an empty room. `password` is hashed immediately and the
    /// plaintext is not retained.
    pub fn new(
        id: RoomId,
        name: String,
        password: Option<&str>,
        config: RoomConfig,
    ) -> Self {
        let password_hash = password.map(|pw| hash_password(&id, pw));
        Self {
            id,
            name,
            password_hash,
            state: RoomState::Waiting,
            players: Vec::with_capacity(RoomConfig::CAPACITY),
            ready: HashSet::new(),
            choices: HashMap::new(),
            scores: HashMap::new(),
            series: Series::new(config.best_of),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    /// Seated players in join order.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= RoomConfig::CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_ready(&self, player: PlayerId) -> bool {
        self.ready.contains(&player)
    }

    pub fn has_chosen(&self, player: PlayerId) -> bool {
        self.choices.contains_key(&player)
    }

    pub fn score_of(&self, player: PlayerId) -> Score {
        self.scores.get(&player).copied().unwrap_or_default()
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Checks a join attempt against the stored hash. Rooms without a
    /// password accept anything.
    pub fn verify_password(&self, attempt: Option<&str>) -> bool {
        match (&self.password_hash, attempt) {
            (None, _) => true,
            (Some(hash), Some(pw)) => hash_password(&self.id, pw) == *hash,
            (Some(_), None) => false,
        }
    }

    // -- roster ------------------------------------------------------------

    /// Seats a player. Only the registry calls this so that its
    /// player → room index stays in step.
    pub(crate) fn add_player(
        &mut self,
        player: PlayerId,
    ) -> Result<(), RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::InvalidState(
                "a round is in progress in this room".into(),
            ));
        }
        if self.is_full() {
            return Err(RoomError::RoomFull(RoomConfig::CAPACITY));
        }
        if self.contains(player) {
            return Err(RoomError::AlreadyInRoom(self.id.clone()));
        }

        self.players.push(player);
        self.scores.insert(player, Score::default());
        self.series.track(player);
        self.series.reset();
        Ok(())
    }

    /// Unseats a player. Allowed in any state.
    ///
    /// Leaving while `Playing` voids the round: choices and readiness are
    /// cleared and the room drops back to `Waiting` with no forfeit.
    /// Returns `true` if a live round was voided.
    pub(crate) fn remove_player(
        &mut self,
        player: PlayerId,
    ) -> Result<bool, RoomError> {
        let Some(pos) = self.players.iter().position(|p| *p == player) else {
            return Err(RoomError::NotInRoom);
        };
        self.players.remove(pos);
        self.scores.remove(&player);
        self.series.untrack(player);
        self.series.reset();

        let voided = self.state == RoomState::Playing;
        if voided {
            self.end_round();
        } else {
            self.ready.remove(&player);
            self.choices.remove(&player);
        }
        Ok(voided)
    }

    // -- round lifecycle ----------------------------------------------------

    /// Records that `player` wants to play the next round.
    ///
    /// When every seat is taken and every seated player is ready, the room
    /// moves to `Playing`, resetting a finished series first. The caller is
    /// responsible for arming the round timer on [`ReadyProgress::Started`].
    pub fn mark_ready(
        &mut self,
        player: PlayerId,
    ) -> Result<ReadyProgress, RoomError> {
        if !self.contains(player) {
            return Err(RoomError::NotInRoom);
        }
        if self.state == RoomState::Playing {
            return Ok(ReadyProgress::Ignored);
        }

        self.ready.insert(player);
        if !self.can_start() {
            return Ok(ReadyProgress::Waiting);
        }

        if self.series.is_over() {
            self.series.reset();
        }
        let is_first_game = self.scores.values().all(Score::is_zero);
        self.state = RoomState::Playing;
        Ok(ReadyProgress::Started { is_first_game })
    }

    fn can_start(&self) -> bool {
        self.is_full() && self.players.iter().all(|p| self.ready.contains(p))
    }

    /// Locks in `player`'s choice for the live round.
    ///
    /// # Errors
    /// `InvalidState` outside `Playing`, `AlreadyChose` on a second
    /// submission in the same round.
    pub fn submit_choice(
        &mut self,
        player: PlayerId,
        choice: Choice,
    ) -> Result<ChoiceProgress, RoomError> {
        if !self.contains(player) {
            return Err(RoomError::NotInRoom);
        }
        if !self.state.accepts_choices() {
            return Err(RoomError::InvalidState(
                "no round is in progress".into(),
            ));
        }
        if self.choices.contains_key(&player) {
            return Err(RoomError::AlreadyChose);
        }

        self.choices.insert(player, choice);
        if self.choices.len() == self.players.len() {
            Ok(ChoiceProgress::Complete)
        } else {
            Ok(ChoiceProgress::Pending)
        }
    }

    /// Assigns a uniformly random choice to every seated player who has not
    /// chosen. Returns the filled-in picks in seating order.
    pub fn fill_missing_choices<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Vec<(PlayerId, Choice)> {
        let mut filled = Vec::new();
        if !self.state.accepts_choices() {
            return filled;
        }
        for player in &self.players {
            if self.choices.contains_key(player) {
                continue;
            }
            let choice = Choice::ALL[rng.random_range(0..Choice::ALL.len())];
            self.choices.insert(*player, choice);
            filled.push((*player, choice));
        }
        filled
    }

    /// Adjudicates the live round and returns the room to `Waiting`.
    ///
    /// Lifetime scores and the series are updated; choices and readiness
    /// are cleared. The series itself is left as is, even when over.
    pub fn resolve_round(&mut self) -> Result<RoundResult, RoomError> {
        if self.state != RoomState::Playing {
            return Err(RoomError::InvalidState(
                "no round is in progress".into(),
            ));
        }

        let outcomes = resolve(&self.choices);
        for (player, outcome) in &outcomes {
            self.scores.entry(*player).or_default().record(*outcome);
        }
        let before = self.series.is_over();
        let winner = self.series.record_round(&self.players, &outcomes);
        let series_winner = if before { None } else { winner };

        let choices = std::mem::take(&mut self.choices);
        self.end_round();

        Ok(RoundResult {
            choices,
            outcomes,
            series_winner,
        })
    }

    fn end_round(&mut self) {
        self.choices.clear();
        self.ready.clear();
        self.state = RoomState::Waiting;
    }

    // -- views ----------------------------------------------------------------

    /// Public view of the room. `name_of` supplies display names, which
    /// the room itself does not own.
    pub fn snapshot(&self, name_of: impl Fn(PlayerId) -> String) -> RoomSnapshot {
        let players = self
            .players
            .iter()
            .map(|p| {
                let name = name_of(*p);
                PlayerSummary {
                    player_id: *p,
                    player_name: name.clone(),
                    name,
                    ready: self.ready.contains(p),
                }
            })
            .collect();
        let scores = self
            .players
            .iter()
            .map(|p| (name_of(*p), self.score_of(*p)))
            .collect();

        RoomSnapshot {
            room_id: self.id.clone(),
            room_name: self.name.clone(),
            max_players: RoomConfig::CAPACITY,
            current_players: self.players.len(),
            is_full: self.is_full(),
            has_password: self.has_password(),
            game_state: self.state.into(),
            players,
            scores,
        }
    }

    pub fn series_snapshot(&self) -> SeriesSnapshot {
        self.series.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: PlayerId = PlayerId(1);
    const Y: PlayerId = PlayerId(2);

    fn room() -> Room {
        Room::new(
            RoomId::from("abcd1234"),
            "Lobby".into(),
            None,
            RoomConfig::default(),
        )
    }

    fn seated() -> Room {
        let mut r = room();
        r.add_player(X).unwrap();
        r.add_player(Y).unwrap();
        r
    }

    fn playing() -> Room {
        let mut r = seated();
        r.mark_ready(X).unwrap();
        r.mark_ready(Y).unwrap();
        r
    }

    fn name_of(p: PlayerId) -> String {
        format!("Player_{}", p.0)
    }

    #[test]
    fn test_third_player_is_rejected_without_mutation() {
        let mut r = seated();
        let err = r.add_player(PlayerId(3)).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(2)));
        assert_eq!(r.players(), &[X, Y]);
        assert_eq!(r.series_snapshot().wins.len(), 2);
    }

    #[test]
    fn test_join_refused_while_playing() {
        let mut r = playing();
        let err = r.add_player(PlayerId(3)).unwrap_err();
        assert!(matches!(err, RoomError::InvalidState(_)));
        assert_eq!(r.players().len(), 2);
    }

    #[test]
    fn test_seat_reopens_after_void() {
        let mut r = playing();
        r.remove_player(Y).unwrap();
        assert!(r.add_player(PlayerId(3)).is_ok());
        assert_eq!(r.players(), &[X, PlayerId(3)]);
    }

    #[test]
    fn test_lone_player_ready_does_not_start() {
        let mut r = room();
        r.add_player(X).unwrap();
        assert_eq!(r.mark_ready(X).unwrap(), ReadyProgress::Waiting);
        assert_eq!(r.state(), RoomState::Waiting);
        assert!(r.is_ready(X));
    }

    #[test]
    fn test_both_ready_starts_first_game() {
        let mut r = seated();
        assert_eq!(r.mark_ready(X).unwrap(), ReadyProgress::Waiting);
        assert_eq!(
            r.mark_ready(Y).unwrap(),
            ReadyProgress::Started {
                is_first_game: true
            }
        );
        assert_eq!(r.state(), RoomState::Playing);
    }

    #[test]
    fn test_ready_while_playing_is_ignored() {
        let mut r = playing();
        assert_eq!(r.mark_ready(X).unwrap(), ReadyProgress::Ignored);
    }

    #[test]
    fn test_choice_outside_playing_is_rejected() {
        let mut r = seated();
        let err = r.submit_choice(X, Choice::Rock).unwrap_err();
        assert!(matches!(err, RoomError::InvalidState(_)));
        assert!(!r.has_chosen(X));
    }

    #[test]
    fn test_second_choice_is_rejected() {
        let mut r = playing();
        r.submit_choice(X, Choice::Rock).unwrap();
        let err = r.submit_choice(X, Choice::Paper).unwrap_err();
        assert!(matches!(err, RoomError::AlreadyChose));
    }

    #[test]
    fn test_rock_beats_scissors_round() {
        let mut r = playing();
        assert_eq!(
            r.submit_choice(X, Choice::Rock).unwrap(),
            ChoiceProgress::Pending
        );
        assert_eq!(
            r.submit_choice(Y, Choice::Scissors).unwrap(),
            ChoiceProgress::Complete
        );

        let result = r.resolve_round().unwrap();
        assert_eq!(result.outcomes[&X], Outcome::Win);
        assert_eq!(result.outcomes[&Y], Outcome::Lose);
        assert_eq!(result.choices[&Y], Choice::Scissors);
        assert_eq!(result.series_winner, None);

        assert_eq!(r.score_of(X).wins, 1);
        assert_eq!(r.score_of(Y).losses, 1);
        assert_eq!(r.series().wins_of(X), 1);
        assert_eq!(r.state(), RoomState::Waiting);
        assert!(!r.is_ready(X) && !r.is_ready(Y));
        assert!(!r.has_chosen(X) && !r.has_chosen(Y));
    }

    #[test]
    fn test_rematch_is_not_first_game() {
        let mut r = playing();
        r.submit_choice(X, Choice::Rock).unwrap();
        r.submit_choice(Y, Choice::Rock).unwrap();
        r.resolve_round().unwrap();

        r.mark_ready(X).unwrap();
        assert_eq!(
            r.mark_ready(Y).unwrap(),
            ReadyProgress::Started {
                is_first_game: false
            }
        );
    }

    #[test]
    fn test_finished_series_resets_on_restart() {
        let mut r = playing();
        for _ in 0..2 {
            r.submit_choice(X, Choice::Paper).unwrap();
            r.submit_choice(Y, Choice::Rock).unwrap();
            let result = r.resolve_round().unwrap();
            if r.series().is_over() {
                assert_eq!(result.series_winner, Some(X));
            } else {
                r.mark_ready(X).unwrap();
                r.mark_ready(Y).unwrap();
            }
        }
        // Series persists through resolution.
        assert!(r.series().is_over());
        assert_eq!(r.series().wins_of(X), 2);

        r.mark_ready(X).unwrap();
        assert!(r.series().is_over());
        r.mark_ready(Y).unwrap();
        assert!(!r.series().is_over());
        assert_eq!(r.series().wins_of(X), 0);
        // Lifetime scores survive the series reset.
        assert_eq!(r.score_of(X).wins, 2);
    }

    #[test]
    fn test_fill_missing_choices_only_fills_gaps() {
        let mut r = playing();
        r.submit_choice(X, Choice::Paper).unwrap();
        let filled = r.fill_missing_choices(&mut rand::rng());
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].0, Y);
        assert!(r.has_chosen(Y));

        let result = r.resolve_round().unwrap();
        assert_eq!(result.choices[&X], Choice::Paper);
    }

    #[test]
    fn test_fill_missing_choices_is_noop_when_waiting() {
        let mut r = seated();
        assert!(r.fill_missing_choices(&mut rand::rng()).is_empty());
    }

    #[test]
    fn test_resolve_outside_playing_is_error() {
        let mut r = seated();
        assert!(r.resolve_round().is_err());
        assert_eq!(r.state(), RoomState::Waiting);
    }

    #[test]
    fn test_leaving_mid_round_voids_it() {
        let mut r = playing();
        r.submit_choice(X, Choice::Rock).unwrap();
        assert!(r.remove_player(Y).unwrap());
        assert_eq!(r.state(), RoomState::Waiting);
        assert_eq!(r.players(), &[X]);
        assert!(!r.has_chosen(X));
        assert!(!r.is_ready(X));
        assert_eq!(r.score_of(X), Score::default());
        assert_eq!(r.series_snapshot().wins.len(), 1);
    }

    #[test]
    fn test_leaving_while_waiting_keeps_others_ready() {
        let mut r = seated();
        r.mark_ready(X).unwrap();
        assert!(!r.remove_player(Y).unwrap());
        assert!(r.is_ready(X));
        assert_eq!(r.state(), RoomState::Waiting);
    }

    #[test]
    fn test_remove_unknown_player_is_error() {
        let mut r = room();
        assert!(matches!(r.remove_player(X), Err(RoomError::NotInRoom)));
    }

    #[test]
    fn test_password_is_hashed_and_checked() {
        let id = RoomId::from("abcd1234");
        let r = Room::new(
            id.clone(),
            "Vault".into(),
            Some("hunter2"),
            RoomConfig::default(),
        );
        assert!(r.has_password());
        assert!(r.verify_password(Some("hunter2")));
        assert!(!r.verify_password(Some("hunter3")));
        assert!(!r.verify_password(None));
        assert_eq!(hash_password(&id, "hunter2").len(), 64);
        assert_ne!(
            hash_password(&id, "hunter2"),
            hash_password(&RoomId::from("other"), "hunter2")
        );
    }

    #[test]
    fn test_open_room_accepts_any_password() {
        let r = room();
        assert!(r.verify_password(None));
        assert!(r.verify_password(Some("anything")));
    }

    #[test]
    fn test_snapshot_shape() {
        let mut r = seated();
        r.mark_ready(Y).unwrap();
        let snap = r.snapshot(name_of);
        assert_eq!(snap.room_name, "Lobby");
        assert_eq!(snap.max_players, 2);
        assert_eq!(snap.current_players, 2);
        assert!(snap.is_full);
        assert!(!snap.has_password);
        assert_eq!(snap.players[0].player_id, X);
        assert_eq!(snap.players[1].name, "Player_2");
        assert_eq!(snap.players[1].player_name, "Player_2");
        assert!(snap.players[1].ready);
        assert!(!snap.players[0].ready);
        assert_eq!(snap.scores["Player_1"], Score::default());
    }
}
