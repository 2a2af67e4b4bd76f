// src/models/squiggle.rs
//
// Row shapes returned by the Squiggle statistics API. Every endpoint wraps
// its rows under one top-level key; a missing key is an upstream error, not
// an empty result.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct SquiggleResponse {
    #[serde(default)]
    pub games: Option<Vec<FixtureRow>>,
    #[serde(default)]
    pub teams: Option<Vec<TeamApiRow>>,
    #[serde(default)]
    pub standings: Option<Vec<StandingRow>>,
    #[serde(default)]
    pub tips: Option<Vec<PredictionApiRow>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRow {
    pub id: i64,
    pub year: i32,
    pub round: u32,
    #[serde(default)]
    pub roundname: Option<String>,
    /// Local date-time, `YYYY-MM-DD HH:MM:SS`, zone given separately in `tz`.
    pub date: String,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    /// Percentage played, 100 when final.
    #[serde(default)]
    pub complete: i64,
    pub hteamid: i64,
    pub ateamid: i64,
    #[serde(default)]
    pub hgoals: Option<i64>,
    #[serde(default)]
    pub hbehinds: Option<i64>,
    #[serde(default)]
    pub agoals: Option<i64>,
    #[serde(default)]
    pub abehinds: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamApiRow {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub abbrev: Option<String>,
}

/// Ladder row. Only id and name are modelled; the rest is carried verbatim
/// and stored as a blob against the team.
#[derive(Debug, Clone, Deserialize)]
pub struct StandingRow {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionApiRow {
    pub gameid: i64,
    pub hteamid: i64,
    pub ateamid: i64,
    pub sourceid: i64,
    /// Squiggle serves this as a string ("65") or a number depending on the
    /// source; accept both.
    #[serde(deserialize_with = "percent_from_string_or_number")]
    pub hconfidence: f64,
}

fn percent_from_string_or_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("confidence out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("bad confidence '{}'", s))),
        other => Err(serde::de::Error::custom(format!(
            "confidence must be string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_parses_from_string_and_number() {
        let from_string: PredictionApiRow = serde_json::from_str(
            r#"{"gameid":1,"hteamid":2,"ateamid":3,"sourceid":9,"hconfidence":"65"}"#,
        )
        .unwrap();
        assert_eq!(from_string.hconfidence, 65.0);

        let from_number: PredictionApiRow = serde_json::from_str(
            r#"{"gameid":1,"hteamid":2,"ateamid":3,"sourceid":9,"hconfidence":57.5}"#,
        )
        .unwrap();
        assert_eq!(from_number.hconfidence, 57.5);
    }

    #[test]
    fn confidence_rejects_other_shapes() {
        let res = serde_json::from_str::<PredictionApiRow>(
            r#"{"gameid":1,"hteamid":2,"ateamid":3,"sourceid":9,"hconfidence":[65]}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn standing_keeps_unmodelled_fields() {
        let row: StandingRow = serde_json::from_str(
            r#"{"id":4,"name":"Geelong","rank":1,"pts":32,"percentage":143.2}"#,
        )
        .unwrap();
        assert_eq!(row.id, 4);
        assert_eq!(row.extra["rank"], 1);
    }
}
