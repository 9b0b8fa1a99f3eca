//! Simultaneous-choice resolution.

use std::collections::{BTreeSet, HashMap};

use arena_protocol::{Choice, Outcome, PlayerId};

/// Maps every submitted choice to a per-player outcome.
///
/// With one or three distinct signs on the table every player draws. With
/// exactly two, the sign that beats the other wins and everyone holding it
/// gets [`Outcome::Win`]; the rest get [`Outcome::Lose`].
///
/// Total and side-effect free: a single entry (or none) resolves to draws.
pub fn resolve(
    choices: &HashMap<PlayerId, Choice>,
) -> HashMap<PlayerId, Outcome> {
    let distinct: Vec<Choice> = choices
        .values()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let winning = match distinct.as_slice() {
        &[a, b] => Some(if a.beats(b) { a } else { b }),
        _ => None,
    };

    choices
        .iter()
        .map(|(player, choice)| {
            let outcome = match winning {
                None => Outcome::Draw,
                Some(w) if *choice == w => Outcome::Win,
                Some(_) => Outcome::Lose,
            };
            (*player, outcome)
        })
        .collect()
}
