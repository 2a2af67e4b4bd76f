use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::tips;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(tips::submit_tip))
        .route("/:round", get(tips::get_tips))
}
