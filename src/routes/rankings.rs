use axum::{routing::get, Router};

use crate::handlers::rankings;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:round", get(rankings::get_rankings))
}
