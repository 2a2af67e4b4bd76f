// src/services/importer.rs
//
// Translate/upsert importer. Each Squiggle row kind is decomposed into the
// store's independent table rows first (pure functions, tested in
// isolation), then written with idempotent upserts: re-running an import for
// the same round never duplicates rows. Round and team upserts additionally
// swallow the duplicate-key race two concurrent imports can produce. A
// failed write aborts its batch and surfaces; retrying is the caller's
// concern.

use std::sync::Arc;

use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::{Collection, Database};

use crate::errors::{AppError, Result};
use crate::models::rows::{GameRow, GameTeamRow, PredictionRow, RoundRow, TeamRow};
use crate::models::squiggle::{FixtureRow, PredictionApiRow, StandingRow, TeamApiRow};
use crate::services::squiggle::SquiggleClient;

// ========== TRANSLATION ==========

pub fn to_round_row(fixture: &FixtureRow) -> RoundRow {
    RoundRow {
        round_year: fixture.year,
        round_number: fixture.round,
        round_name: fixture
            .roundname
            .clone()
            .unwrap_or_else(|| format!("Round {}", fixture.round)),
    }
}

/// Joins the source's local date and timezone offset into one ISO-8601
/// instant, normalized to UTC. A source without an offset is read as UTC.
pub fn normalize_scheduled(date: &str, tz: Option<&str>) -> Result<DateTime<Utc>> {
    let mut iso = date.replacen(' ', "T", 1);
    match tz {
        Some(offset) if !offset.is_empty() => iso.push_str(offset),
        _ => iso.push('Z'),
    }
    DateTime::parse_from_rfc3339(&iso)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::BadTimestamp(iso))
}

pub fn to_game_row(fixture: &FixtureRow) -> Result<GameRow> {
    Ok(GameRow {
        id: fixture.id,
        venue: fixture.venue.clone().unwrap_or_default(),
        scheduled: normalize_scheduled(&fixture.date, fixture.tz.as_deref())?,
        round_year: fixture.year,
        round_number: fixture.round,
        complete: fixture.complete == 100,
    })
}

/// One fixture always becomes exactly two game-team rows sharing its game
/// id. Scores are written only when the source has them, so an unplayed
/// game's goals/behinds stay absent in the store rather than null.
pub fn to_game_team_rows(fixture: &FixtureRow) -> [GameTeamRow; 2] {
    [
        GameTeamRow {
            game_id: fixture.id,
            team_id: fixture.hteamid,
            home: true,
            goals: fixture.hgoals.map(Some),
            behinds: fixture.hbehinds.map(Some),
        },
        GameTeamRow {
            game_id: fixture.id,
            team_id: fixture.ateamid,
            home: false,
            goals: fixture.agoals.map(Some),
            behinds: fixture.abehinds.map(Some),
        },
    ]
}

pub fn to_team_row(team: &TeamApiRow) -> TeamRow {
    TeamRow {
        id: team.id,
        team_name: team.name.clone(),
        abbreviation: team.abbrev.clone(),
        standing: None,
    }
}

/// The ladder row is kept verbatim as a JSON blob against the team.
pub fn standing_to_team_row(standing: &StandingRow) -> TeamRow {
    let mut blob = standing.extra.clone();
    blob.insert("id".to_string(), serde_json::json!(standing.id));
    blob.insert("name".to_string(), serde_json::json!(standing.name));
    TeamRow {
        id: standing.id,
        team_name: standing.name.clone(),
        abbreviation: None,
        standing: Some(serde_json::Value::Object(blob).to_string()),
    }
}

/// One upstream prediction covers both sides: the away confidence is the
/// complement of the home confidence, so the pair sums to 100 by
/// construction.
pub fn to_prediction_rows(prediction: &PredictionApiRow) -> [PredictionRow; 2] {
    [
        PredictionRow {
            game_id: prediction.gameid,
            team_id: prediction.hteamid,
            source_id: prediction.sourceid,
            confidence: prediction.hconfidence,
        },
        PredictionRow {
            game_id: prediction.gameid,
            team_id: prediction.ateamid,
            source_id: prediction.sourceid,
            confidence: 100.0 - prediction.hconfidence,
        },
    ]
}

// ========== UPSERTS ==========

pub struct SquiggleImporter {
    client: Arc<SquiggleClient>,
    db: Database,
}

impl SquiggleImporter {
    pub fn new(client: Arc<SquiggleClient>, db: Database) -> Self {
        SquiggleImporter { client, db }
    }

    pub async fn update_teams(&self, year: i32) -> Result<()> {
        let teams = self.client.fetch_teams(year).await?;
        tracing::info!(year, count = teams.len(), "importing teams");

        let collection: Collection<bson::Document> = self.db.collection("team");
        for team in teams.iter().map(to_team_row) {
            let result = collection
                .update_one(
                    doc! { "_id": team.id },
                    // Teams are seeded once; later imports leave them alone.
                    doc! { "$setOnInsert": {
                        "team_name": &team.team_name,
                        "abbreviation": team.abbreviation.as_deref(),
                    }},
                )
                .upsert(true)
                .await;
            swallow_duplicate(result)?;
        }
        Ok(())
    }

    pub async fn update_games(&self, year: i32, round: u32) -> Result<()> {
        let fixtures = self.client.fetch_games(year, round).await?;
        tracing::info!(year, round, count = fixtures.len(), "importing fixtures");

        let rounds: Collection<bson::Document> = self.db.collection("round");
        for fixture in &fixtures {
            let row = to_round_row(fixture);
            let result = rounds
                .update_one(
                    doc! { "round_year": row.round_year, "round_number": row.round_number as i64 },
                    doc! { "$setOnInsert": { "round_name": &row.round_name } },
                )
                .upsert(true)
                .await;
            swallow_duplicate(result)?;
        }

        let games: Collection<bson::Document> = self.db.collection("game");
        for fixture in &fixtures {
            let row = to_game_row(fixture)?;
            let mut fields = bson::to_document(&row)?;
            fields.remove("_id");
            games
                .update_one(doc! { "_id": row.id }, doc! { "$set": fields })
                .upsert(true)
                .await?;
        }

        let game_teams: Collection<bson::Document> = self.db.collection("game_team");
        for fixture in &fixtures {
            for row in to_game_team_rows(fixture) {
                let mut fields = bson::to_document(&row)?;
                fields.remove("game_id");
                fields.remove("team_id");
                game_teams
                    .update_one(
                        doc! { "game_id": row.game_id, "team_id": row.team_id },
                        doc! { "$set": fields },
                    )
                    .upsert(true)
                    .await?;
            }
        }

        Ok(())
    }

    pub async fn update_standings(&self, year: i32, round: u32) -> Result<()> {
        let standings = self.client.fetch_standings(year, round).await?;
        tracing::info!(year, round, count = standings.len(), "importing standings");

        let collection: Collection<bson::Document> = self.db.collection("team");
        for team in standings.iter().map(standing_to_team_row) {
            let result = collection
                .update_one(
                    doc! { "_id": team.id },
                    doc! { "$set": {
                        "team_name": &team.team_name,
                        "standing": team.standing.as_deref(),
                    }},
                )
                .upsert(true)
                .await;
            swallow_duplicate(result)?;
        }
        Ok(())
    }

    pub async fn update_predictions(&self, year: i32, round: u32) -> Result<()> {
        let predictions = self.client.fetch_predictions(year, round).await?;
        tracing::info!(year, round, count = predictions.len(), "importing predictions");

        let collection: Collection<bson::Document> = self.db.collection("prediction");
        for prediction in &predictions {
            for row in to_prediction_rows(prediction) {
                collection
                    .update_one(
                        doc! {
                            "game_id": row.game_id,
                            "team_id": row.team_id,
                            "source_id": row.source_id,
                        },
                        doc! { "$set": { "confidence": row.confidence } },
                    )
                    .upsert(true)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Two near-simultaneous imports may both decide to insert the same round or
/// team; the loser's unique-key conflict is not an error.
fn swallow_duplicate<T>(result: mongodb::error::Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if is_duplicate_key(&err) => {
            tracing::debug!("ignoring duplicate-key race on upsert");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}
