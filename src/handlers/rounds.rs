use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::queries;
use crate::errors::{AppError, Result};
use crate::models::game::{Game, MatchResult, RoundKey, Score, Team};
use crate::models::rows::{GameId, RoundNo, TeamId};
use crate::services::reconcile::{reconcile, History, RoundRows};
use crate::services::rounds::{partition_rounds, GameRef};
use crate::services::tip_engine::{Session, HISTORY_WINDOW};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "state", content = "points", rename_all = "lowercase")]
pub enum ScoreView {
    Known(i64),
    Void,
    Unknown,
}

impl From<Score> for ScoreView {
    fn from(score: Score) -> Self {
        match score {
            Score::Points(points) => ScoreView::Known(points),
            Score::Void => ScoreView::Void,
            Score::Unknown => ScoreView::Unknown,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamView {
    #[serde(rename = "teamId")]
    pub team_id: TeamId,
    #[serde(rename = "teamName")]
    pub team_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    pub score: ScoreView,
    pub result: MatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// Whether the requesting person tipped this side; absent when signed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipped: Option<bool>,
}

impl TeamView {
    fn new(team: &Team, result: MatchResult, person_id: Option<&str>) -> Self {
        TeamView {
            team_id: team.team_id,
            team_name: team.team_name.clone(),
            abbreviation: team.abbreviation.clone(),
            score: team.score().into(),
            result,
            confidence: team.confidence,
            tipped: person_id.map(|p| team.tipped(p)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GameView {
    #[serde(rename = "gameId")]
    pub game_id: GameId,
    pub round: RoundKey,
    pub venue: String,
    pub scheduled: DateTime<Utc>,
    pub complete: bool,
    pub started: bool,
    pub home: TeamView,
    pub away: TeamView,
}

impl GameView {
    pub fn from_game(game: &Game, now: DateTime<Utc>, person_id: Option<&str>) -> Self {
        GameView {
            game_id: game.game_id,
            round: game.round,
            venue: game.venue.clone(),
            scheduled: game.scheduled,
            complete: game.complete,
            started: game.started(now),
            home: TeamView::new(&game.home, game.result_for(true), person_id),
            away: TeamView::new(&game.away, game.result_for(false), person_id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoundResponse {
    pub year: i32,
    pub round: RoundNo,
    pub games: Vec<GameView>,
    /// Games that could not be displayed because their rows were malformed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<GameId>,
}

/// One round, ordered for display.
pub async fn get_round(
    State(state): State<AppState>,
    Path(round): Path<RoundNo>,
) -> Result<Json<RoundResponse>> {
    let year = state.config.season_year;
    tracing::info!(year, round, "GET round");

    let rows = queries::read_round_games(&state.db, year, round).await?;
    let reconciled = reconcile(RoundRows::GameRooted(rows));
    let rounds = partition_rounds(&reconciled.games);
    let refs = rounds
        .get(&round)
        .ok_or(AppError::RoundDataMissing { year, round })?;

    let now = Utc::now();
    let games = refs
        .iter()
        .map(|r| GameView::from_game(&reconciled.games[&r.game_id], now, None))
        .collect();

    Ok(Json(RoundResponse {
        year,
        round,
        games,
        skipped: reconciled.skipped,
    }))
}

#[derive(Debug, Serialize)]
pub struct TippingResponse {
    pub year: i32,
    pub round: RoundNo,
    /// Every game in the trailing window, keyed by id.
    pub games: BTreeMap<GameId, GameView>,
    /// round_number → ordered game refs, for the current and prior rounds.
    pub rounds: BTreeMap<RoundNo, Vec<GameRef>>,
    /// team_id → round_number → game_id; drives the last-N-rounds display.
    pub history: History,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<GameId>,
}

/// The tipping page payload: current round plus a trailing window of
/// history, reconciled from the team-rooted shape in one read.
pub async fn get_tipping_round(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
    Path(round): Path<RoundNo>,
) -> Result<Json<TippingResponse>> {
    let year = state.config.season_year;
    let person_id = session.as_ref().map(|Extension(s)| s.person_id.as_str());
    tracing::info!(year, round, signed_in = person_id.is_some(), "GET tipping round");

    let from_round = round.saturating_sub(HISTORY_WINDOW);
    let rows = queries::read_tipping_window(&state.db, year, from_round, round).await?;
    let reconciled = reconcile(RoundRows::TeamRooted(rows));
    let rounds = partition_rounds(&reconciled.games);
    if !rounds.contains_key(&round) {
        return Err(AppError::RoundDataMissing { year, round });
    }

    let now = Utc::now();
    let games = reconciled
        .games
        .values()
        .map(|game| (game.game_id, GameView::from_game(game, now, person_id)))
        .collect();

    Ok(Json(TippingResponse {
        year,
        round,
        games,
        rounds,
        history: reconciled.history,
        skipped: reconciled.skipped,
    }))
}
