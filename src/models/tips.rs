// src/models/tips.rs
//
// Tip state shared between the store and the merge engine. Two maps of the
// same shape exist at runtime: canonical tips (confirmed persisted) and
// local tips (edits not yet confirmed). Local entries always win for display
// until a successful persist migrates them into canonical.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::rows::{GameId, PersonId, TeamId, TipRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipChoice {
    #[serde(rename = "teamId")]
    pub team_id: TeamId,
}

pub type Tips = HashMap<PersonId, HashMap<GameId, TipChoice>>;

pub fn tips_from_rows(rows: impl IntoIterator<Item = TipRow>) -> Tips {
    let mut tips = Tips::new();
    for row in rows {
        tips.entry(row.person_id)
            .or_default()
            .insert(row.game_id, TipChoice { team_id: row.team_id });
    }
    tips
}

pub fn tips_to_rows(tips: &Tips) -> Vec<TipRow> {
    let mut rows: Vec<TipRow> = tips
        .iter()
        .flat_map(|(person_id, games)| {
            games.iter().map(|(game_id, choice)| TipRow {
                person_id: person_id.clone(),
                game_id: *game_id,
                team_id: choice.team_id,
            })
        })
        .collect();
    // Deterministic batch order, handy for tests and logs.
    rows.sort_by(|a, b| (&a.person_id, a.game_id).cmp(&(&b.person_id, b.game_id)));
    rows
}

/// Folds confirmed-persisted rows into canonical tips. A merge, never a
/// replace: existing entries for other games survive. Idempotent.
pub fn merge_confirmed(canonical: &mut Tips, confirmed: &[TipRow]) {
    for row in confirmed {
        canonical
            .entry(row.person_id.clone())
            .or_default()
            .insert(row.game_id, TipChoice { team_id: row.team_id });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error(String),
}

/// Snapshot handed to callers. The sign-in prompt is a signal only; this
/// layer never renders a dialog.
#[derive(Debug, Clone, Serialize)]
pub struct TipView {
    pub tips: Option<Tips>,
    #[serde(rename = "localTips")]
    pub local_tips: Tips,
    #[serde(rename = "saveStatus")]
    pub save_status: SaveStatus,
    #[serde(rename = "promptSignIn")]
    pub prompt_sign_in: bool,
}

impl TipView {
    pub fn signed_out() -> Self {
        TipView {
            tips: None,
            local_tips: Tips::new(),
            save_status: SaveStatus::Idle,
            prompt_sign_in: true,
        }
    }

    /// Local tips take display precedence over canonical for the same
    /// (person, game) pair until reconciled.
    pub fn displayed_tip(&self, person_id: &str, game_id: GameId) -> Option<TipChoice> {
        if let Some(choice) = self
            .local_tips
            .get(person_id)
            .and_then(|games| games.get(&game_id))
        {
            return Some(*choice);
        }
        self.tips
            .as_ref()
            .and_then(|tips| tips.get(person_id))
            .and_then(|games| games.get(&game_id))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(person: &str, game: GameId, team: TeamId) -> TipRow {
        TipRow {
            person_id: person.to_string(),
            game_id: game,
            team_id: team,
        }
    }

    #[test]
    fn rows_group_by_person_then_game() {
        let tips = tips_from_rows(vec![row("a", 1, 10), row("a", 2, 20), row("b", 1, 11)]);
        assert_eq!(tips["a"][&1], TipChoice { team_id: 10 });
        assert_eq!(tips["a"][&2], TipChoice { team_id: 20 });
        assert_eq!(tips["b"][&1], TipChoice { team_id: 11 });
    }

    #[test]
    fn merge_is_idempotent_and_keeps_other_games() {
        let mut canonical = tips_from_rows(vec![row("a", 1, 10)]);
        let confirmed = vec![row("a", 2, 20)];

        merge_confirmed(&mut canonical, &confirmed);
        let once = canonical.clone();
        merge_confirmed(&mut canonical, &confirmed);

        assert_eq!(canonical, once);
        assert_eq!(canonical["a"][&1], TipChoice { team_id: 10 });
        assert_eq!(canonical["a"][&2], TipChoice { team_id: 20 });
    }

    #[test]
    fn local_takes_display_precedence() {
        let view = TipView {
            tips: Some(tips_from_rows(vec![row("a", 7, 3)])),
            local_tips: tips_from_rows(vec![row("a", 7, 4)]),
            save_status: SaveStatus::Saving,
            prompt_sign_in: false,
        };
        assert_eq!(view.displayed_tip("a", 7), Some(TipChoice { team_id: 4 }));
    }

    #[test]
    fn canonical_shows_through_when_no_local_edit() {
        let view = TipView {
            tips: Some(tips_from_rows(vec![row("a", 7, 3)])),
            local_tips: Tips::new(),
            save_status: SaveStatus::Saved,
            prompt_sign_in: false,
        };
        assert_eq!(view.displayed_tip("a", 7), Some(TipChoice { team_id: 3 }));
        assert_eq!(view.displayed_tip("a", 8), None);
    }

    #[test]
    fn round_trip_rows_are_sorted() {
        let tips = tips_from_rows(vec![row("b", 9, 1), row("a", 2, 5), row("a", 1, 4)]);
        let rows = tips_to_rows(&tips);
        assert_eq!(rows, vec![row("a", 1, 4), row("a", 2, 5), row("b", 9, 1)]);
    }
}
