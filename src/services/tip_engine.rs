// src/services/tip_engine.rs
//
// Tip store & merge engine. One worker task owns all tip state for a person:
// canonical tips (confirmed persisted) and local tips (edits in flight).
// Every mutation goes through the worker's single message loop, so local
// edits can never interleave with a merge. The merge step is the only code
// allowed to move data from local into canonical, and only after the store
// confirmed the write.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::database::tip_store::TipStore;
use crate::errors::{AppError, Result};
use crate::models::rows::{GameId, PersonId, RoundNo, TeamId, TipRow};
use crate::models::tips::{
    merge_confirmed, tips_from_rows, tips_to_rows, SaveStatus, TipChoice, TipView, Tips,
};

/// Rounds of prior tips fetched alongside the current round, so recent
/// history renders without a second query.
pub const HISTORY_WINDOW: RoundNo = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub person_id: PersonId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EngineState {
    Idle,
    Fetching,
    Editing,
    Persisting,
    Reconciled,
    Failed(String),
}

enum Msg {
    SetRound(RoundNo),
    SetSession(Option<Session>),
    Select { game_id: GameId, team_id: TeamId },
    Snapshot(oneshot::Sender<TipView>),
    // Internal: completions of the spawned store calls.
    FetchDone { seq: u64, result: Result<Vec<TipRow>> },
    PersistDone { sent: Vec<TipRow>, result: Result<Vec<TipRow>> },
}

#[derive(Clone)]
pub struct TipEngineHandle {
    tx: mpsc::Sender<Msg>,
}

impl TipEngineHandle {
    pub async fn set_round(&self, round: RoundNo) -> Result<()> {
        self.send(Msg::SetRound(round)).await
    }

    pub async fn set_session(&self, session: Option<Session>) -> Result<()> {
        self.send(Msg::SetSession(session)).await
    }

    pub async fn select(&self, game_id: GameId, team_id: TeamId) -> Result<()> {
        self.send(Msg::Select { game_id, team_id }).await
    }

    pub async fn snapshot(&self) -> Result<TipView> {
        let (tx, rx) = oneshot::channel();
        self.send(Msg::Snapshot(tx)).await?;
        rx.await
            .map_err(|_| AppError::EngineGone("worker dropped snapshot request".to_string()))
    }

    async fn send(&self, msg: Msg) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| AppError::EngineGone("worker task has stopped".to_string()))
    }
}

pub fn spawn_tip_engine<S: TipStore>(
    store: Arc<S>,
    year: i32,
    round: RoundNo,
    session: Option<Session>,
) -> TipEngineHandle {
    let (tx, rx) = mpsc::channel(32);
    let mut engine = TipEngine {
        store,
        year,
        round,
        session,
        state: EngineState::Idle,
        canonical: None,
        local: Tips::new(),
        prompt_sign_in: false,
        fetch_seq: 0,
        confirmed_since_fetch: Vec::new(),
        persisting: false,
        tx: tx.downgrade(),
        rx,
    };
    tokio::spawn(async move {
        engine.begin_fetch();
        engine.run().await;
    });
    TipEngineHandle { tx }
}

struct TipEngine<S: TipStore> {
    store: Arc<S>,
    year: i32,
    round: RoundNo,
    session: Option<Session>,
    state: EngineState,
    canonical: Option<Tips>,
    local: Tips,
    prompt_sign_in: bool,
    /// Tag for the most recent fetch; results carrying an older tag are
    /// stale (the round or session moved on) and get discarded.
    fetch_seq: u64,
    /// Rows confirmed persisted since the current fetch was issued. Re-applied
    /// over the fetch result so a read taken before those writes landed
    /// cannot clobber them.
    confirmed_since_fetch: Vec<TipRow>,
    persisting: bool,
    /// Weak so the worker does not keep its own channel alive: once every
    /// handle is dropped, `recv` drains and returns `None` and the task ends.
    tx: mpsc::WeakSender<Msg>,
    rx: mpsc::Receiver<Msg>,
}

impl<S: TipStore> TipEngine<S> {
    async fn run(&mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg);
        }
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::SetRound(round) => {
                if round != self.round {
                    self.round = round;
                    self.begin_fetch();
                }
            }
            Msg::SetSession(session) => {
                if session != self.session {
                    if person_of(&session) != person_of(&self.session) {
                        // Local edits are scoped to one signed-in person.
                        self.local.clear();
                    }
                    self.session = session;
                    if self.session.is_some() {
                        self.prompt_sign_in = false;
                    }
                    self.begin_fetch();
                }
            }
            Msg::Select { game_id, team_id } => match &self.session {
                None => {
                    // No tip state mutation without a session; ask the caller
                    // to show a sign-in prompt instead.
                    self.prompt_sign_in = true;
                }
                Some(session) => {
                    self.local
                        .entry(session.person_id.clone())
                        .or_default()
                        .insert(game_id, TipChoice { team_id });
                    self.state = EngineState::Editing;
                    self.maybe_persist();
                }
            },
            Msg::Snapshot(reply) => {
                let _ = reply.send(TipView {
                    tips: self.canonical.clone(),
                    local_tips: self.local.clone(),
                    save_status: self.save_status(),
                    prompt_sign_in: self.prompt_sign_in,
                });
            }
            Msg::FetchDone { seq, result } => self.on_fetch_done(seq, result),
            Msg::PersistDone { sent, result } => self.on_persist_done(sent, result),
        }
    }

    fn begin_fetch(&mut self) {
        self.fetch_seq += 1;
        self.confirmed_since_fetch.clear();
        let Some(session) = &self.session else {
            self.canonical = None;
            self.state = EngineState::Idle;
            return;
        };
        self.state = EngineState::Fetching;

        let seq = self.fetch_seq;
        let store = self.store.clone();
        let tx = self.tx.clone();
        let person_id = session.person_id.clone();
        let year = self.year;
        let from_round = self.round.saturating_sub(HISTORY_WINDOW);
        let to_round = self.round;
        tokio::spawn(async move {
            let result = store.fetch_tips(&person_id, year, from_round, to_round).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Msg::FetchDone { seq, result }).await;
            }
        });
    }

    fn on_fetch_done(&mut self, seq: u64, result: Result<Vec<TipRow>>) {
        if seq != self.fetch_seq {
            tracing::debug!(seq, current = self.fetch_seq, "discarding stale tip fetch");
            return;
        }
        match result {
            Ok(rows) => {
                let mut tips = tips_from_rows(rows);
                // Writes confirmed after this fetch left are newer than
                // anything it read; they win.
                merge_confirmed(&mut tips, &self.confirmed_since_fetch);
                self.canonical = Some(tips);
                if self.state == EngineState::Fetching {
                    self.state = if self.local.is_empty() {
                        EngineState::Idle
                    } else {
                        EngineState::Editing
                    };
                }
            }
            Err(err) => {
                tracing::warn!(%err, round = self.round, "tip fetch failed");
                if self.state == EngineState::Fetching {
                    self.state = EngineState::Idle;
                }
            }
        }
        // An edit may have queued behind the fetch.
        self.maybe_persist();
    }

    fn maybe_persist(&mut self) {
        if self.persisting || self.local.is_empty() {
            return;
        }
        self.persisting = true;
        self.state = EngineState::Persisting;

        let rows = tips_to_rows(&self.local);
        let store = self.store.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = store.upsert_tips(rows.clone()).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Msg::PersistDone { sent: rows, result }).await;
            }
        });
    }

    fn on_persist_done(&mut self, sent: Vec<TipRow>, result: Result<Vec<TipRow>>) {
        self.persisting = false;
        match result {
            Ok(confirmed) => {
                let canonical = self.canonical.get_or_insert_with(Tips::new);
                merge_confirmed(canonical, &confirmed);
                // If the window fetch is still in flight it read the store
                // before this write; remember the write so the fetch result
                // cannot clobber it when it lands.
                self.confirmed_since_fetch.extend(confirmed);

                // Clear the local entries this write covered. An entry
                // re-edited while the write was in flight no longer matches
                // what was sent; it survives and re-persists below.
                for row in &sent {
                    let mut person_empty = false;
                    if let Some(games) = self.local.get_mut(&row.person_id) {
                        if games.get(&row.game_id).map(|c| c.team_id) == Some(row.team_id) {
                            games.remove(&row.game_id);
                        }
                        person_empty = games.is_empty();
                    }
                    if person_empty {
                        self.local.remove(&row.person_id);
                    }
                }

                if self.local.is_empty() {
                    if self.state == EngineState::Persisting {
                        self.state = EngineState::Reconciled;
                    }
                } else {
                    self.maybe_persist();
                }
            }
            Err(err) => {
                // The user's picks stay in local; the next edit re-attempts.
                tracing::warn!(%err, "tip persist failed, retaining local edits");
                self.state = EngineState::Failed(err.to_string());
            }
        }
    }

    fn save_status(&self) -> SaveStatus {
        match &self.state {
            EngineState::Idle | EngineState::Fetching => SaveStatus::Idle,
            EngineState::Editing | EngineState::Persisting => SaveStatus::Saving,
            EngineState::Reconciled => SaveStatus::Saved,
            EngineState::Failed(message) => SaveStatus::Error(message.clone()),
        }
    }
}

fn person_of(session: &Option<Session>) -> Option<&str> {
    session.as_ref().map(|s| s.person_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct MemStore {
        rows: Mutex<Vec<TipRow>>,
        fail_writes: AtomicBool,
        /// When set, upsert_tips blocks until a permit is released.
        write_gate: Option<Arc<Semaphore>>,
        /// Per-window fetch results keyed by `to_round`, with an optional
        /// artificial delay. Empty map means "serve whatever was written".
        fetch_plan: Mutex<HashMap<RoundNo, (u64, Vec<TipRow>)>>,
    }

    #[async_trait]
    impl TipStore for MemStore {
        async fn fetch_tips(
            &self,
            person_id: &str,
            _year: i32,
            _from_round: RoundNo,
            to_round: RoundNo,
        ) -> Result<Vec<TipRow>> {
            let planned = self.fetch_plan.lock().unwrap().get(&to_round).cloned();
            if let Some((delay_ms, rows)) = planned {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                return Ok(rows);
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.person_id == person_id)
                .cloned()
                .collect())
        }

        async fn upsert_tips(&self, rows: Vec<TipRow>) -> Result<Vec<TipRow>> {
            if let Some(gate) = &self.write_gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::ExternalApi("store write refused".to_string()));
            }
            let mut stored = self.rows.lock().unwrap();
            for row in &rows {
                stored.retain(|r| !(r.person_id == row.person_id && r.game_id == row.game_id));
                stored.push(row.clone());
            }
            Ok(rows)
        }
    }

    fn session() -> Option<Session> {
        Some(Session {
            person_id: "alice".to_string(),
        })
    }

    async fn wait_for<F>(handle: &TipEngineHandle, check: F) -> TipView
    where
        F: Fn(&TipView) -> bool,
    {
        for _ in 0..500 {
            let view = handle.snapshot().await.unwrap();
            if check(&view) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("engine never reached expected state");
    }

    #[tokio::test]
    async fn select_persists_and_reconciles_into_canonical() {
        let store = Arc::new(MemStore::default());
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());

        handle.select(7, 3).await.unwrap();
        let view = wait_for(&handle, |v| v.save_status == SaveStatus::Saved).await;

        let canonical = view.tips.unwrap();
        assert_eq!(canonical["alice"][&7], TipChoice { team_id: 3 });
        assert!(view.local_tips.is_empty());
        assert_eq!(
            store.rows.lock().unwrap().as_slice(),
            &[TipRow {
                person_id: "alice".to_string(),
                game_id: 7,
                team_id: 3
            }]
        );
    }

    #[tokio::test]
    async fn failed_persist_retains_local_and_next_edit_retries() {
        let store = Arc::new(MemStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());

        handle.select(7, 3).await.unwrap();
        let view = wait_for(&handle, |v| matches!(v.save_status, SaveStatus::Error(_))).await;
        assert_eq!(view.local_tips["alice"][&7], TipChoice { team_id: 3 });
        assert!(store.rows.lock().unwrap().is_empty());

        // Store recovers; the next edit re-attempts the whole local batch.
        store.fail_writes.store(false, Ordering::SeqCst);
        handle.select(8, 5).await.unwrap();
        let view = wait_for(&handle, |v| v.save_status == SaveStatus::Saved).await;

        let canonical = view.tips.unwrap();
        assert_eq!(canonical["alice"][&7], TipChoice { team_id: 3 });
        assert_eq!(canonical["alice"][&8], TipChoice { team_id: 5 });
        assert!(view.local_tips.is_empty());
    }

    #[tokio::test]
    async fn select_without_session_only_requests_sign_in() {
        let store = Arc::new(MemStore::default());
        let handle = spawn_tip_engine(store.clone(), 2022, 9, None);

        handle.select(7, 3).await.unwrap();
        let view = wait_for(&handle, |v| v.prompt_sign_in).await;
        assert!(view.tips.is_none());
        assert!(view.local_tips.is_empty());
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_edit_outranks_canonical_until_reconciled() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(MemStore {
            rows: Mutex::new(vec![TipRow {
                person_id: "alice".to_string(),
                game_id: 7,
                team_id: 9,
            }]),
            write_gate: Some(gate.clone()),
            ..MemStore::default()
        });
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());
        wait_for(&handle, |v| v.tips.is_some()).await;

        // Persist blocked on the gate: local must win for display.
        handle.select(7, 3).await.unwrap();
        let view = wait_for(&handle, |v| v.save_status == SaveStatus::Saving).await;
        assert_eq!(view.displayed_tip("alice", 7), Some(TipChoice { team_id: 3 }));
        assert_eq!(view.tips.unwrap()["alice"][&7], TipChoice { team_id: 9 });

        gate.add_permits(1);
        let view = wait_for(&handle, |v| v.save_status == SaveStatus::Saved).await;
        assert_eq!(view.tips.unwrap()["alice"][&7], TipChoice { team_id: 3 });
        assert!(view.local_tips.is_empty());
    }

    #[tokio::test]
    async fn re_edit_during_persist_survives_and_repersists() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(MemStore {
            write_gate: Some(gate.clone()),
            ..MemStore::default()
        });
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());

        handle.select(7, 3).await.unwrap();
        wait_for(&handle, |v| v.save_status == SaveStatus::Saving).await;
        // Change the pick while the first write is still in flight.
        handle.select(7, 4).await.unwrap();

        gate.add_permits(2);
        let view = wait_for(&handle, |v| v.save_status == SaveStatus::Saved).await;
        assert_eq!(view.tips.unwrap()["alice"][&7], TipChoice { team_id: 4 });
        assert!(view.local_tips.is_empty());
        let stored = store.rows.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].team_id, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_does_not_clobber_newer_round() {
        let store = Arc::new(MemStore::default());
        store.fetch_plan.lock().unwrap().insert(
            5,
            (
                500,
                vec![TipRow {
                    person_id: "alice".to_string(),
                    game_id: 50,
                    team_id: 1,
                }],
            ),
        );
        store.fetch_plan.lock().unwrap().insert(
            6,
            (
                10,
                vec![TipRow {
                    person_id: "alice".to_string(),
                    game_id: 60,
                    team_id: 2,
                }],
            ),
        );

        let handle = spawn_tip_engine(store.clone(), 2022, 5, session());
        // Navigate away before the round-5 fetch resolves.
        handle.set_round(6).await.unwrap();

        // Wait out both planned delays; the slow round-5 result arrives last
        // and must be discarded.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let view = wait_for(&handle, |v| v.tips.is_some()).await;
        let canonical = view.tips.unwrap();
        assert!(canonical["alice"].contains_key(&60));
        assert!(!canonical["alice"].contains_key(&50));
    }

    #[tokio::test(start_paused = true)]
    async fn persist_landing_mid_fetch_keeps_window_history() {
        let store = Arc::new(MemStore::default());
        // The trailing-window fetch is slow and carries an older round's tip.
        store.fetch_plan.lock().unwrap().insert(
            9,
            (
                500,
                vec![TipRow {
                    person_id: "alice".to_string(),
                    game_id: 60,
                    team_id: 2,
                }],
            ),
        );
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());

        // Edit and persist while that fetch is still in flight.
        handle.select(7, 3).await.unwrap();
        wait_for(&handle, |v| v.save_status == SaveStatus::Saved).await;

        // The fetch read the store before the write landed; when it resolves
        // it must fill in the window history without undoing the new pick.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let view = wait_for(&handle, |v| {
            v.tips
                .as_ref()
                .is_some_and(|t| t.get("alice").is_some_and(|g| g.contains_key(&60)))
        })
        .await;
        let canonical = view.tips.unwrap();
        assert_eq!(canonical["alice"][&60], TipChoice { team_id: 2 });
        assert_eq!(canonical["alice"][&7], TipChoice { team_id: 3 });
        assert_eq!(view.save_status, SaveStatus::Saved);
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_worker() {
        let store = Arc::new(MemStore::default());
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());
        wait_for(&handle, |v| v.tips.is_some()).await;

        drop(handle);
        for _ in 0..500 {
            // The worker and its spawned store calls hold the only other
            // references; the count returning to one means the task ended.
            if Arc::strong_count(&store) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("worker kept running after every handle was dropped");
    }

    #[tokio::test]
    async fn session_change_drops_other_persons_local_edits() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(MemStore {
            fail_writes: AtomicBool::new(true),
            write_gate: Some(gate.clone()),
            ..MemStore::default()
        });
        gate.add_permits(64);
        let handle = spawn_tip_engine(store.clone(), 2022, 9, session());

        handle.select(7, 3).await.unwrap();
        wait_for(&handle, |v| matches!(v.save_status, SaveStatus::Error(_))).await;

        handle
            .set_session(Some(Session {
                person_id: "bob".to_string(),
            }))
            .await
            .unwrap();
        let view = wait_for(&handle, |v| v.local_tips.is_empty()).await;
        assert!(view.local_tips.is_empty());
    }
}
