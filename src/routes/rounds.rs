use axum::{routing::get, Router};

use crate::handlers::rounds;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:round", get(rounds::get_round))
        .route("/:round/tipping", get(rounds::get_tipping_round))
}
