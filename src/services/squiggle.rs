// src/services/squiggle.rs
//
// Client for the Squiggle AFL statistics API. Queries are a single `q`
// parameter of semicolon-joined arguments (`games;year=2022;round=9`).
// Every fetch names the key it expects back; a response without that key is
// an upstream error, never an empty result.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::squiggle::{
    FixtureRow, PredictionApiRow, SquiggleResponse, StandingRow, TeamApiRow,
};

#[derive(Debug, Clone)]
pub struct SquiggleClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SquiggleClient {
    pub fn new(config: &AppConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .user_agent(config.squiggle_user_agent.clone())
            .default_headers(headers)
            .build()
            .expect("reqwest client");
        SquiggleClient {
            http,
            endpoint: config.squiggle_endpoint.clone(),
        }
    }

    async fn query(&self, kind: &str, args: &[(&str, String)]) -> Result<SquiggleResponse> {
        let mut combined = kind.to_string();
        for (name, value) in args {
            combined.push_str(&format!(";{}={}", name, value));
        }
        let url = format!("{}?q={}", self.endpoint, combined);

        tracing::debug!(%url, "querying Squiggle");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::external_api(format!(
                "Squiggle returned {} for q={}",
                response.status(),
                combined
            )));
        }
        Ok(response.json().await?)
    }

    pub async fn fetch_games(&self, year: i32, round: u32) -> Result<Vec<FixtureRow>> {
        self.query(
            "games",
            &[("year", year.to_string()), ("round", round.to_string())],
        )
        .await?
        .games
        .ok_or(AppError::MissingResponseKey("games"))
    }

    pub async fn fetch_teams(&self, year: i32) -> Result<Vec<TeamApiRow>> {
        self.query("teams", &[("year", year.to_string())])
            .await?
            .teams
            .ok_or(AppError::MissingResponseKey("teams"))
    }

    pub async fn fetch_standings(&self, year: i32, round: u32) -> Result<Vec<StandingRow>> {
        self.query(
            "standings",
            &[("year", year.to_string()), ("round", round.to_string())],
        )
        .await?
        .standings
        .ok_or(AppError::MissingResponseKey("standings"))
    }

    pub async fn fetch_predictions(&self, year: i32, round: u32) -> Result<Vec<PredictionApiRow>> {
        self.query(
            "tips",
            &[("year", year.to_string()), ("round", round.to_string())],
        )
        .await?
        .tips
        .ok_or(AppError::MissingResponseKey("tips"))
    }
}
