use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::database::queries;
use crate::errors::Result;
use crate::models::rows::RoundNo;
use crate::models::tips::tips_from_rows;
use crate::services::rankings::{tally_rankings, RankingEntry};
use crate::services::reconcile::{reconcile, RoundRows};
use crate::state::AppState;

/// Correct-tip counts per person across the season up to a round.
pub async fn get_rankings(
    State(state): State<AppState>,
    Path(round): Path<RoundNo>,
) -> Result<Json<Vec<RankingEntry>>> {
    let year = state.config.season_year;
    tracing::info!(year, round, "GET rankings");

    let rows = queries::read_games_through(&state.db, year, round).await?;
    let reconciled = reconcile(RoundRows::GameRooted(rows));
    let tips = tips_from_rows(queries::read_all_tips(&state.db, year, round).await?);

    Ok(Json(tally_rankings(&reconciled.games, &tips)))
}
