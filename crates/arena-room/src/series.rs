//! Best-of-N series tracking.

use std::collections::HashMap;

use arena_protocol::{Outcome, PlayerId, SeriesSnapshot};

/// Series wins a player needs to take a best-of-`best_of` series.
pub fn threshold(best_of: u32) -> u32 {
    best_of.div_ceil(2)
}

/// Per-room best-of-N accumulator.
///
/// Only `Win` outcomes count; draws and losses leave the tally untouched.
/// Once a player reaches [`threshold`] the series is over and stays over
/// until [`Series::reset`].
#[derive(Debug, Clone)]
pub struct Series {
    best_of: u32,
    wins: HashMap<PlayerId, u32>,
    winner: Option<PlayerId>,
}

impl Series {
    pub fn new(best_of: u32) -> Self {
        Self {
            best_of,
            wins: HashMap::new(),
            winner: None,
        }
    }

    pub fn best_of(&self) -> u32 {
        self.best_of
    }

    /// The series winner, if the series is over.
    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Series wins for `player`, 0 if they are not tracked.
    pub fn wins_of(&self, player: PlayerId) -> u32 {
        self.wins.get(&player).copied().unwrap_or(0)
    }

    /// Starts tracking `player` at zero wins.
    pub fn track(&mut self, player: PlayerId) {
        self.wins.entry(player).or_insert(0);
    }

    /// Stops tracking `player`.
    pub fn untrack(&mut self, player: PlayerId) {
        self.wins.remove(&player);
    }

    /// Zeroes every tracked tally and clears the winner.
    pub fn reset(&mut self) {
        for w in self.wins.values_mut() {
            *w = 0;
        }
        self.winner = None;
    }

    /// Applies one round's outcomes.
    ///
    /// `order` is the room's seating order: if more than one player crosses
    /// the threshold in the same round, the first one in `order` takes the
    /// series. Returns the winner if this round ended the series.
    pub fn record_round(
        &mut self,
        order: &[PlayerId],
        outcomes: &HashMap<PlayerId, Outcome>,
    ) -> Option<PlayerId> {
        if self.is_over() {
            return None;
        }

        let needed = threshold(self.best_of);
        for player in order {
            if outcomes.get(player) != Some(&Outcome::Win) {
                continue;
            }
            let tally = self.wins.entry(*player).or_insert(0);
            *tally += 1;
            if *tally >= needed && self.winner.is_none() {
                self.winner = Some(*player);
            }
        }
        self.winner
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            best_of: self.best_of,
            wins: self
                .wins
                .iter()
                .map(|(id, w)| (id.0.to_string(), *w))
                .collect(),
            over: self.is_over(),
            winner_id: self.winner,
        }
    }
}
