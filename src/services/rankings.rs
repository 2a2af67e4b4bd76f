// src/services/rankings.rs
//
// Correct-tip tally: the aggregate behind the rankings page. Runs over the
// reconciled game model so winner semantics live in exactly one place.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::game::{Game, MatchResult};
use crate::models::rows::GameId;
use crate::models::tips::Tips;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    #[serde(rename = "personId")]
    pub person_id: String,
    pub wins: u32,
}

/// Counts, per person, the tips whose chosen team won. Games without a
/// decided result (not started, in progress, voided) and tips on games
/// outside the map contribute nothing. Draws count for nobody.
pub fn tally_rankings(games: &BTreeMap<GameId, Game>, tips: &Tips) -> Vec<RankingEntry> {
    let mut wins: HashMap<&str, u32> = HashMap::new();
    for (person_id, picks) in tips {
        wins.entry(person_id).or_default();
        for (game_id, choice) in picks {
            let Some(game) = games.get(game_id) else {
                continue;
            };
            let result = if choice.team_id == game.home.team_id {
                game.result_for(true)
            } else if choice.team_id == game.away.team_id {
                game.result_for(false)
            } else {
                // A tip naming a team that never played this game is stale
                // source data; it cannot score.
                continue;
            };
            if result == MatchResult::Won {
                *wins.entry(person_id).or_default() += 1;
            }
        }
    }

    let mut entries: Vec<RankingEntry> = wins
        .into_iter()
        .map(|(person_id, wins)| RankingEntry {
            person_id: person_id.to_string(),
            wins,
        })
        .collect();
    entries.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.person_id.cmp(&b.person_id)));
    entries
}
