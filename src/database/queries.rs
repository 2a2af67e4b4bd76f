// src/database/queries.rs
//
// Aggregation pipelines producing the two denormalized join shapes the
// reconciler consumes. The reconciler tolerates either; which one a read
// path uses is chosen by what else it needs (the team-rooted shape is the
// only one that can feed the history index).

use bson::{doc, Document};
use futures_util::TryStreamExt;
use mongodb::{Collection, Database};

use crate::errors::Result;
use crate::models::rows::{GameRootedRow, RoundNo, TeamRootedRow, TipRow};

/// Shape (b): games of one round with their two participant rows, each
/// carrying its team reference and recorded tips.
pub async fn read_round_games(db: &Database, year: i32, round: RoundNo) -> Result<Vec<GameRootedRow>> {
    let games: Collection<Document> = db.collection("game");
    let pipeline = vec![
        doc! { "$match": { "round_year": year, "round_number": round as i64 } },
        doc! { "$lookup": {
            "from": "game_team",
            "localField": "_id",
            "foreignField": "game_id",
            "as": "game_team",
            "pipeline": [
                { "$lookup": {
                    "from": "team",
                    "localField": "team_id",
                    "foreignField": "_id",
                    "as": "team",
                }},
                { "$unwind": { "path": "$team", "preserveNullAndEmptyArrays": true } },
                tip_lookup(),
                prediction_lookup(),
            ],
        }},
    ];

    collect(games.aggregate(pipeline).await?).await
}

/// Shape (b) across all rounds up to and including `to_round`; feeds the
/// rankings tally.
pub async fn read_games_through(
    db: &Database,
    year: i32,
    to_round: RoundNo,
) -> Result<Vec<GameRootedRow>> {
    let games: Collection<Document> = db.collection("game");
    let pipeline = vec![
        doc! { "$match": { "round_year": year, "round_number": { "$lte": to_round as i64 } } },
        doc! { "$lookup": {
            "from": "game_team",
            "localField": "_id",
            "foreignField": "game_id",
            "as": "game_team",
            "pipeline": [
                { "$lookup": {
                    "from": "team",
                    "localField": "team_id",
                    "foreignField": "_id",
                    "as": "team",
                }},
                { "$unwind": { "path": "$team", "preserveNullAndEmptyArrays": true } },
            ],
        }},
    ];

    collect(games.aggregate(pipeline).await?).await
}

/// Shape (a): every team with its game_team rows for a trailing window of
/// rounds, games and predictions nested. This single read powers the tipping
/// page including the last-N-rounds history lookups.
pub async fn read_tipping_window(
    db: &Database,
    year: i32,
    from_round: RoundNo,
    to_round: RoundNo,
) -> Result<Vec<TeamRootedRow>> {
    let teams: Collection<Document> = db.collection("team");
    let pipeline = vec![doc! { "$lookup": {
        "from": "game_team",
        "localField": "_id",
        "foreignField": "team_id",
        "as": "game_team",
        "pipeline": [
            { "$lookup": {
                "from": "game",
                "localField": "game_id",
                "foreignField": "_id",
                "as": "game",
            }},
            { "$unwind": { "path": "$game", "preserveNullAndEmptyArrays": true } },
            { "$match": {
                "game.round_year": year,
                "game.round_number": { "$gte": from_round as i64, "$lte": to_round as i64 },
            }},
            tip_lookup(),
            prediction_lookup(),
        ],
    }}];

    collect(teams.aggregate(pipeline).await?).await
}

/// Every tip recorded for the season up to `to_round`, all persons.
pub async fn read_all_tips(db: &Database, year: i32, to_round: RoundNo) -> Result<Vec<TipRow>> {
    let tips: Collection<Document> = db.collection("tip");
    let pipeline = vec![
        doc! { "$lookup": {
            "from": "game",
            "localField": "game_id",
            "foreignField": "_id",
            "as": "game",
        }},
        doc! { "$unwind": "$game" },
        doc! { "$match": {
            "game.round_year": year,
            "game.round_number": { "$lte": to_round as i64 },
        }},
        doc! { "$project": { "_id": 0, "person_id": 1, "game_id": 1, "team_id": 1 } },
    ];

    collect(tips.aggregate(pipeline).await?).await
}

fn tip_lookup() -> Document {
    doc! { "$lookup": {
        "from": "tip",
        "let": { "gid": "$game_id", "tid": "$team_id" },
        "as": "tip",
        "pipeline": [
            { "$match": { "$expr": { "$and": [
                { "$eq": ["$game_id", "$$gid"] },
                { "$eq": ["$team_id", "$$tid"] },
            ]}}},
            { "$project": { "_id": 0, "person_id": 1, "game_id": 1, "team_id": 1 } },
        ],
    }}
}

fn prediction_lookup() -> Document {
    doc! { "$lookup": {
        "from": "prediction",
        "let": { "gid": "$game_id", "tid": "$team_id" },
        "as": "prediction",
        "pipeline": [
            { "$match": { "$expr": { "$and": [
                { "$eq": ["$game_id", "$$gid"] },
                { "$eq": ["$team_id", "$$tid"] },
            ]}}},
            { "$project": { "_id": 0, "confidence": 1 } },
        ],
    }}
}

async fn collect<T: serde::de::DeserializeOwned>(mut cursor: mongodb::Cursor<Document>) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    while let Some(document) = cursor.try_next().await? {
        rows.push(bson::from_document(document)?);
    }
    Ok(rows)
}
