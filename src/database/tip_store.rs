// src/database/tip_store.rs

use async_trait::async_trait;
use bson::doc;
use futures_util::TryStreamExt;
use mongodb::{Collection, Database};

use crate::errors::Result;
use crate::models::rows::{RoundNo, TipRow};

/// Persistence seam for the tip engine. `upsert_tips` returns the rows as
/// confirmed written, which the engine merges back into canonical state.
#[async_trait]
pub trait TipStore: Send + Sync + 'static {
    async fn fetch_tips(
        &self,
        person_id: &str,
        year: i32,
        from_round: RoundNo,
        to_round: RoundNo,
    ) -> Result<Vec<TipRow>>;

    async fn upsert_tips(&self, rows: Vec<TipRow>) -> Result<Vec<TipRow>>;
}

#[derive(Clone)]
pub struct MongoTipStore {
    db: Database,
}

impl MongoTipStore {
    pub fn new(db: Database) -> Self {
        MongoTipStore { db }
    }
}

#[async_trait]
impl TipStore for MongoTipStore {
    /// Tip rows only carry a game id, so the round window filter goes through
    /// a join against the game collection.
    async fn fetch_tips(
        &self,
        person_id: &str,
        year: i32,
        from_round: RoundNo,
        to_round: RoundNo,
    ) -> Result<Vec<TipRow>> {
        let collection: Collection<bson::Document> = self.db.collection("tip");
        let pipeline = vec![
            doc! { "$match": { "person_id": person_id } },
            doc! { "$lookup": {
                "from": "game",
                "localField": "game_id",
                "foreignField": "_id",
                "as": "game",
            }},
            doc! { "$unwind": "$game" },
            doc! { "$match": {
                "game.round_year": year,
                "game.round_number": { "$gte": from_round as i64, "$lte": to_round as i64 },
            }},
            doc! { "$project": { "_id": 0, "person_id": 1, "game_id": 1, "team_id": 1 } },
        ];

        let mut cursor = collection.aggregate(pipeline).await?;
        let mut rows = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            rows.push(bson::from_document(document)?);
        }
        Ok(rows)
    }

    /// Idempotent per (person, game): re-submitting the same pick or changing
    /// a pick both land on the same row.
    async fn upsert_tips(&self, rows: Vec<TipRow>) -> Result<Vec<TipRow>> {
        let collection: Collection<bson::Document> = self.db.collection("tip");
        for row in &rows {
            collection
                .update_one(
                    doc! { "person_id": &row.person_id, "game_id": row.game_id },
                    doc! { "$set": { "team_id": row.team_id } },
                )
                .upsert(true)
                .await?;
        }
        Ok(rows)
    }
}
