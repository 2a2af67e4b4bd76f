// src/models/rows.rs
//
// Row shapes as they live in the store, plus the two denormalized join
// shapes the reconciler accepts. `goals`/`behinds` use a double Option so
// that a field which is absent (score not yet known) stays distinct from a
// field which is explicitly null (game voided); collapsing the two is a
// defect the model layer guards against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GameId = i64;
pub type TeamId = i64;
pub type RoundNo = u32;
pub type PersonId = String;

// ========== FLAT TABLE ROWS ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRow {
    #[serde(rename = "_id")]
    pub id: TeamId,
    pub team_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    /// Ladder position blob from the standings import, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standing: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRow {
    pub round_year: i32,
    pub round_number: RoundNo,
    pub round_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRow {
    #[serde(rename = "_id")]
    pub id: GameId,
    pub venue: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub scheduled: DateTime<Utc>,
    pub round_year: i32,
    pub round_number: RoundNo,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTeamRow {
    pub game_id: GameId,
    pub team_id: TeamId,
    pub home: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub goals: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub behinds: Option<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipRow {
    pub person_id: PersonId,
    pub game_id: GameId,
    pub team_id: TeamId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    pub game_id: GameId,
    pub team_id: TeamId,
    pub source_id: i64,
    pub confidence: f64,
}

// ========== JOINED SHAPES ==========

/// Scalar game fields as they appear nested under a game_team join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameJoin {
    #[serde(rename = "_id")]
    pub id: GameId,
    pub venue: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub scheduled: DateTime<Utc>,
    pub round_year: i32,
    pub round_number: RoundNo,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRef {
    #[serde(rename = "_id")]
    pub id: TeamId,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionJoin {
    pub confidence: f64,
}

/// Shape (a): team → game_team[] → game, with advisory predictions and the
/// tips already recorded against each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRootedRow {
    #[serde(rename = "_id")]
    pub id: TeamId,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub game_team: Vec<TeamRootedGameTeam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRootedGameTeam {
    pub game_id: GameId,
    pub home: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub goals: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub behinds: Option<Option<i64>>,
    #[serde(default)]
    pub prediction: Vec<PredictionJoin>,
    #[serde(default)]
    pub tip: Vec<TipRow>,
    #[serde(default)]
    pub game: Option<GameJoin>,
}

/// Shape (b): game → game_team[] → team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRootedRow {
    #[serde(rename = "_id")]
    pub id: GameId,
    pub venue: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub scheduled: DateTime<Utc>,
    pub round_year: i32,
    pub round_number: RoundNo,
    pub complete: bool,
    #[serde(default)]
    pub game_team: Vec<GameRootedGameTeam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRootedGameTeam {
    pub game_id: GameId,
    pub home: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub goals: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub behinds: Option<Option<i64>>,
    #[serde(default)]
    pub prediction: Vec<PredictionJoin>,
    #[serde(default)]
    pub tip: Vec<TipRow>,
    #[serde(default)]
    pub team: Option<TeamRef>,
}

impl GameRootedRow {
    pub fn scalars(&self) -> GameJoin {
        GameJoin {
            id: self.id,
            venue: self.venue.clone(),
            scheduled: self.scheduled,
            round_year: self.round_year,
            round_number: self.round_number,
            complete: self.complete,
        }
    }
}
