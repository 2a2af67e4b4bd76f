// src/database/indexes.rs
//
// Unique indexes backing the importer's idempotent upserts. Safe to run on
// every boot; create_index is a no-op when the index already exists.

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};

use crate::errors::Result;

pub async fn ensure_indexes(db: &Database) -> Result<()> {
    unique_index(db.collection("round"), doc! { "round_year": 1, "round_number": 1 }).await?;
    unique_index(db.collection("game_team"), doc! { "game_id": 1, "team_id": 1 }).await?;
    unique_index(db.collection("tip"), doc! { "person_id": 1, "game_id": 1 }).await?;
    unique_index(
        db.collection("prediction"),
        doc! { "game_id": 1, "team_id": 1, "source_id": 1 },
    )
    .await?;

    tracing::info!("✅ Unique indexes ensured");
    Ok(())
}

async fn unique_index(
    collection: Collection<bson::Document>,
    keys: bson::Document,
) -> Result<()> {
    let model = IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build();
    collection.create_index(model).await?;
    Ok(())
}
