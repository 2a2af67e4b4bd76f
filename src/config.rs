// config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub squiggle_endpoint: String,
    pub squiggle_user_agent: String,
    /// The season every query and import is scoped to. Always explicit, never
    /// derived from the wall clock inside the core.
    pub season_year: i32,
    pub jwt_secret: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        AppConfig {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "tipping".to_string()),
            squiggle_endpoint: env::var("SQUIGGLE_ENDPOINT")
                .unwrap_or_else(|_| "https://api.squiggle.com.au/".to_string()),
            squiggle_user_agent: env::var("SQUIGGLE_USER_AGENT").unwrap_or_else(|_| {
                "TCTippingApp/0.1.0 github.com/tuppercreed/tipping".to_string()
            }),
            season_year: env::var("SEASON_YEAR")
                .expect("SEASON_YEAR must be set")
                .parse()
                .expect("SEASON_YEAR must be a year"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}
