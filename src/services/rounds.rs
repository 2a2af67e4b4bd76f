// src/services/rounds.rs
//
// Round partitioner: groups reconciled games by round number and fixes the
// display order inside each round.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::game::Game;
use crate::models::rows::{GameId, RoundNo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameRef {
    #[serde(rename = "gameId")]
    pub game_id: GameId,
}

/// Partition games by round. Sort key inside a round: scheduled time
/// ascending, ties broken by game id ascending, which makes the order total
/// and stable across runs.
pub fn partition_rounds(games: &BTreeMap<GameId, Game>) -> BTreeMap<RoundNo, Vec<GameRef>> {
    let mut rounds: BTreeMap<RoundNo, Vec<GameRef>> = BTreeMap::new();
    for game in games.values() {
        rounds
            .entry(game.round.number)
            .or_default()
            .push(GameRef { game_id: game.game_id });
    }

    for refs in rounds.values_mut() {
        refs.sort_by_key(|r| (games[&r.game_id].scheduled, r.game_id));
        // Two distinct games can never compare equal: ids are unique map keys.
        debug_assert!(refs.windows(2).all(|w| w[0].game_id != w[1].game_id));
    }

    rounds
}
