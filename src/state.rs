use std::collections::HashMap;
use std::sync::Arc;

use mongodb::Database;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::database::tip_store::MongoTipStore;
use crate::errors::Result;
use crate::models::rows::{PersonId, RoundNo};
use crate::services::importer::SquiggleImporter;
use crate::services::squiggle::SquiggleClient;
use crate::services::tip_engine::{spawn_tip_engine, Session, TipEngineHandle};

/// Engines untouched for this long are dropped from the registry; their
/// worker task ends once the last handle is gone.
const ENGINE_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

struct EngineEntry {
    handle: TipEngineHandle,
    last_used: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub squiggle: Arc<SquiggleClient>,
    pub tip_store: Arc<MongoTipStore>,
    /// One tip engine worker per signed-in person, spawned on first use.
    engines: Arc<Mutex<HashMap<PersonId, EngineEntry>>>,
}

impl AppState {
    pub fn new(db: Database, config: Arc<AppConfig>) -> Self {
        let squiggle = Arc::new(SquiggleClient::new(&config));
        let tip_store = Arc::new(MongoTipStore::new(db.clone()));
        AppState {
            db,
            config,
            squiggle,
            tip_store,
            engines: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get or spawn the engine owning this person's tip state, pointed at
    /// the given round. Each access also sweeps engines nobody has touched
    /// within the idle TTL, so the registry stays bounded by active people.
    pub async fn tip_engine(&self, session: &Session, round: RoundNo) -> Result<TipEngineHandle> {
        let handle = {
            let now = Instant::now();
            let mut engines = self.engines.lock().await;
            engines.retain(|_, entry| now.duration_since(entry.last_used) < ENGINE_IDLE_TTL);

            let entry = engines
                .entry(session.person_id.clone())
                .or_insert_with(|| EngineEntry {
                    handle: spawn_tip_engine(
                        self.tip_store.clone(),
                        self.config.season_year,
                        round,
                        Some(session.clone()),
                    ),
                    last_used: now,
                });
            entry.last_used = now;
            entry.handle.clone()
        };
        handle.set_round(round).await?;
        Ok(handle)
    }

    pub fn importer(&self) -> SquiggleImporter {
        SquiggleImporter::new(self.squiggle.clone(), self.db.clone())
    }
}
