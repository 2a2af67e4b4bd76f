use axum::{routing::post, Router};

use crate::handlers::import;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/teams", post(import::import_teams))
        .route("/games/:round", post(import::import_games))
        .route("/standings/:round", post(import::import_standings))
        .route("/predictions/:round", post(import::import_predictions))
}
