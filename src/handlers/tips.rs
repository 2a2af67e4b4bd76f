use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::rows::{GameId, RoundNo, TeamId};
use crate::models::tips::TipView;
use crate::services::tip_engine::Session;
use crate::state::AppState;

/// Current tip state for the round's trailing window. Signed-out callers
/// get an empty view with the sign-in prompt raised.
pub async fn get_tips(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
    Path(round): Path<RoundNo>,
) -> Result<Json<TipView>> {
    let Some(Extension(session)) = session else {
        return Ok(Json(TipView::signed_out()));
    };
    tracing::info!(round, person = %session.person_id, "GET tips");

    let engine = state.tip_engine(&session, round).await?;
    Ok(Json(engine.snapshot().await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTip {
    #[validate(range(min = 1, message = "round starts at 1"))]
    pub round: RoundNo,
    #[serde(rename = "gameId")]
    pub game_id: GameId,
    #[serde(rename = "teamId")]
    pub team_id: TeamId,
}

/// Records one pick and returns the resulting view. The write is optimistic:
/// the response usually reports `saving`, and a later snapshot shows the
/// pick reconciled into canonical tips.
pub async fn submit_tip(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
    Json(payload): Json<SubmitTip>,
) -> Result<Json<TipView>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let Some(Extension(session)) = session else {
        return Ok(Json(TipView::signed_out()));
    };
    tracing::info!(
        round = payload.round,
        game_id = payload.game_id,
        team_id = payload.team_id,
        person = %session.person_id,
        "POST tip"
    );

    let engine = state.tip_engine(&session, payload.round).await?;
    engine.select(payload.game_id, payload.team_id).await?;
    Ok(Json(engine.snapshot().await?))
}
