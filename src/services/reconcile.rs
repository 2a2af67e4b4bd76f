// src/services/reconcile.rs
//
// Denormalization reconciler. The store hands back one of two joined shapes
// (team-rooted or game-rooted); both are adapted into the same per-game
// accumulator and folded into Game values. Game scalars repeated across join
// rows are kept once, from the first occurrence.

use std::collections::{BTreeMap, HashMap};

use crate::models::game::{Game, Participant};
use crate::models::rows::{
    GameId, GameJoin, GameRootedRow, PredictionJoin, RoundNo, TeamId, TeamRef, TeamRootedRow,
};

/// Raw round data in either of the documented join shapes.
#[derive(Debug)]
pub enum RoundRows {
    TeamRooted(Vec<TeamRootedRow>),
    GameRooted(Vec<GameRootedRow>),
}

pub type History = HashMap<TeamId, BTreeMap<RoundNo, GameId>>;

#[derive(Debug, Default)]
pub struct ReconcileOutput {
    pub games: BTreeMap<GameId, Game>,
    /// team_id → round_number → game_id. Only the team-rooted shape carries
    /// enough rows to build this; game-rooted input leaves it empty.
    pub history: History,
    /// Games whose rows violated the model. Each aborts only itself.
    pub skipped: Vec<GameId>,
}

struct GameAccum {
    scalars: GameJoin,
    participants: Vec<Participant>,
}

pub fn reconcile(rows: RoundRows) -> ReconcileOutput {
    let (accum, history) = match rows {
        RoundRows::TeamRooted(teams) => accumulate_team_rooted(teams),
        RoundRows::GameRooted(games) => (accumulate_game_rooted(games), History::new()),
    };
    let (games, skipped) = build_games(accum);
    ReconcileOutput {
        games,
        history,
        skipped,
    }
}

/// Shape (a): hoist the team out of each nested game_team, detach the nested
/// game, and fold into the accumulator. Also records the history index.
fn accumulate_team_rooted(
    teams: Vec<TeamRootedRow>,
) -> (HashMap<GameId, GameAccum>, History) {
    let mut accum: HashMap<GameId, GameAccum> = HashMap::new();
    let mut history = History::new();

    for team in teams {
        let team_ref = TeamRef {
            id: team.id,
            team_name: team.team_name.clone(),
            abbreviation: team.abbreviation.clone(),
        };
        for game_team in team.game_team {
            let Some(game) = game_team.game else {
                tracing::warn!(
                    game_id = game_team.game_id,
                    team_id = team.id,
                    "game_team row without nested game, dropping"
                );
                continue;
            };

            history
                .entry(team.id)
                .or_default()
                .insert(game.round_number, game.id);

            let participant = Participant {
                game_id: game.id,
                home: game_team.home,
                team: Some(team_ref.clone()),
                goals: game_team.goals,
                behinds: game_team.behinds,
                tips: game_team.tip,
                confidence: mean_confidence(&game_team.prediction),
            };

            accum
                .entry(game.id)
                .or_insert_with(|| GameAccum {
                    scalars: game,
                    participants: Vec::with_capacity(2),
                })
                .participants
                .push(participant);
        }
    }

    (accum, history)
}

/// Shape (b): games already carry their participant rows; lift them straight
/// into the accumulator.
fn accumulate_game_rooted(games: Vec<GameRootedRow>) -> HashMap<GameId, GameAccum> {
    let mut accum: HashMap<GameId, GameAccum> = HashMap::new();

    for game in games {
        let scalars = game.scalars();
        let entry = accum.entry(game.id).or_insert_with(|| GameAccum {
            scalars,
            participants: Vec::with_capacity(2),
        });
        for game_team in game.game_team {
            entry.participants.push(Participant {
                game_id: game.id,
                home: game_team.home,
                team: game_team.team,
                goals: game_team.goals,
                behinds: game_team.behinds,
                tips: game_team.tip,
                confidence: mean_confidence(&game_team.prediction),
            });
        }
    }

    accum
}

fn build_games(accum: HashMap<GameId, GameAccum>) -> (BTreeMap<GameId, Game>, Vec<GameId>) {
    let mut games = BTreeMap::new();
    let mut skipped = Vec::new();

    for (game_id, entry) in accum {
        match Game::new(entry.scalars, entry.participants) {
            Ok(game) => {
                games.insert(game_id, game);
            }
            Err(err) => {
                // Construction only ever fails structurally; transport errors
                // never reach this point.
                debug_assert!(err.is_structural());
                tracing::warn!(game_id, %err, "game could not be reconciled, skipping");
                skipped.push(game_id);
            }
        }
    }
    skipped.sort_unstable();

    (games, skipped)
}

/// Collapses a nested prediction list into one advisory percentage: the
/// rounded mean of all predictor confidences, or nothing when no predictor
/// covered the game.
pub fn mean_confidence(predictions: &[PredictionJoin]) -> Option<u8> {
    if predictions.is_empty() {
        return None;
    }
    let sum: f64 = predictions.iter().map(|p| p.confidence).sum();
    Some((sum / predictions.len() as f64).round() as u8)
}
