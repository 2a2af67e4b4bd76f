use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::errors::Result;
use crate::models::rows::RoundNo;
use crate::state::AppState;

pub async fn import_teams(State(state): State<AppState>) -> Result<Json<Value>> {
    let year = state.config.season_year;
    state.importer().update_teams(year).await?;
    Ok(Json(json!({ "success": true, "message": format!("teams imported for {}", year) })))
}

pub async fn import_games(
    State(state): State<AppState>,
    Path(round): Path<RoundNo>,
) -> Result<Json<Value>> {
    let year = state.config.season_year;
    state.importer().update_games(year, round).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("round {} fixtures imported for {}", round, year),
    })))
}

pub async fn import_standings(
    State(state): State<AppState>,
    Path(round): Path<RoundNo>,
) -> Result<Json<Value>> {
    let year = state.config.season_year;
    state.importer().update_standings(year, round).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("standings after round {} imported for {}", round, year),
    })))
}

pub async fn import_predictions(
    State(state): State<AppState>,
    Path(round): Path<RoundNo>,
) -> Result<Json<Value>> {
    let year = state.config.season_year;
    state.importer().update_predictions(year, round).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("round {} predictions imported for {}", round, year),
    })))
}
