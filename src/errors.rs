// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    // Structural errors: joined rows that violate the data model. Never retried.
    #[error("game {game_id}: per-game team row has no nested team reference")]
    MissingTeamReference { game_id: i64 },

    #[error("game {game_id}: expected exactly 2 participant rows, got {count}")]
    MissingParticipants { game_id: i64, count: usize },

    #[error("game {game_id}: home flag not set on exactly one of two participants")]
    AmbiguousHomeAway { game_id: i64 },

    #[error("no games found for round {round} of {year}")]
    RoundDataMissing { year: i32, round: u32 },

    #[error("Squiggle response missing expected key '{0}'")]
    MissingResponseKey(&'static str),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("unparseable scheduled timestamp '{0}'")]
    BadTimestamp(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("tip engine unavailable: {0}")]
    EngineGone(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
            AppError::MissingTeamReference { .. }
            | AppError::MissingParticipants { .. }
            | AppError::AmbiguousHomeAway { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Malformed round data")
            }
            AppError::RoundDataMissing { .. } => (StatusCode::NOT_FOUND, "Round data missing"),
            AppError::MissingResponseKey(_) => {
                (StatusCode::BAD_GATEWAY, "Upstream response incomplete")
            }
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "External API error"),
            AppError::BadTimestamp(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Bad timestamp"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            AppError::EngineGone(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Tip engine unavailable")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<bson::de::Error> for AppError {
    fn from(err: bson::de::Error) -> Self {
        AppError::ValidationError(format!("BSON decoding error: {}", err))
    }
}

impl From<bson::ser::Error> for AppError {
    fn from(err: bson::ser::Error) -> Self {
        AppError::ValidationError(format!("BSON encoding error: {}", err))
    }
}

impl AppError {
    pub fn external_api(msg: impl Into<String>) -> Self {
        AppError::ExternalApi(msg.into())
    }

    /// True for errors raised while constructing a single game from malformed
    /// rows. Round views log and skip that game instead of failing whole.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AppError::MissingTeamReference { .. }
                | AppError::MissingParticipants { .. }
                | AppError::AmbiguousHomeAway { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
