// src/models/game.rs
//
// Immutable Team/Game value objects plus free derivation functions. All
// derived values (score, winner, started) are computed, never stored, and
// `started` takes the clock as a parameter so tests can pin it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::rows::{GameId, GameJoin, RoundNo, TeamId, TeamRef, TipRow};

/// A side's score, derived from goals and behinds together.
///
/// `Unknown` means a component is absent from the row (not yet imported);
/// `Void` means a component is explicitly null (e.g. a washed-out game).
/// Neither is ever treated as zero points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Points(i64),
    Void,
    Unknown,
}

pub fn compute_score(goals: Option<Option<i64>>, behinds: Option<Option<i64>>) -> Score {
    match (goals, behinds) {
        (None, _) | (_, None) => Score::Unknown,
        (Some(None), _) | (_, Some(None)) => Score::Void,
        (Some(Some(g)), Some(Some(b))) => Score::Points(g * 6 + b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchResult {
    Won,
    Drew,
    Lost,
    Unknown,
}

pub fn compute_winner(own: Score, other: Score) -> MatchResult {
    match (own, other) {
        (Score::Points(a), Score::Points(b)) => {
            if a > b {
                MatchResult::Won
            } else if a < b {
                MatchResult::Lost
            } else {
                MatchResult::Drew
            }
        }
        _ => MatchResult::Unknown,
    }
}

/// A team's participation in one game: identity, per-game stats and the tips
/// recorded against it.
#[derive(Debug, Clone)]
pub struct Team {
    pub team_id: TeamId,
    pub team_name: String,
    pub abbreviation: Option<String>,
    pub goals: Option<Option<i64>>,
    pub behinds: Option<Option<i64>>,
    pub tips: Vec<TipRow>,
    /// Rounded mean of external predictor confidences, advisory only.
    pub confidence: Option<u8>,
}

impl Team {
    pub fn score(&self) -> Score {
        compute_score(self.goals, self.behinds)
    }

    pub fn tipped(&self, person_id: &str) -> bool {
        self.tips.iter().any(|tip| tip.person_id == person_id)
    }
}

/// One per-game team record, hoisted out of either join shape and normalized.
#[derive(Debug, Clone)]
pub struct Participant {
    pub game_id: GameId,
    pub home: bool,
    pub team: Option<TeamRef>,
    pub goals: Option<Option<i64>>,
    pub behinds: Option<Option<i64>>,
    pub tips: Vec<TipRow>,
    pub confidence: Option<u8>,
}

impl Participant {
    fn into_team(self) -> Result<Team> {
        let team = self
            .team
            .ok_or(AppError::MissingTeamReference { game_id: self.game_id })?;
        Ok(Team {
            team_id: team.id,
            team_name: team.team_name,
            abbreviation: team.abbreviation,
            goals: self.goals,
            behinds: self.behinds,
            tips: self.tips,
            confidence: self.confidence,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundKey {
    pub number: RoundNo,
    pub year: i32,
}

#[derive(Debug, Clone)]
pub struct Game {
    pub game_id: GameId,
    pub round: RoundKey,
    pub venue: String,
    pub scheduled: DateTime<Utc>,
    pub complete: bool,
    pub home: Team,
    pub away: Team,
}

impl Game {
    /// Builds a game from its scalar fields and exactly two participant
    /// records, exactly one of them flagged home.
    pub fn new(scalars: GameJoin, participants: Vec<Participant>) -> Result<Game> {
        let [first, second]: [Participant; 2] =
            participants
                .try_into()
                .map_err(|rest: Vec<Participant>| AppError::MissingParticipants {
                    game_id: scalars.id,
                    count: rest.len(),
                })?;

        let (home, away) = match (first.home, second.home) {
            (true, false) => (first, second),
            (false, true) => (second, first),
            _ => return Err(AppError::AmbiguousHomeAway { game_id: scalars.id }),
        };

        Ok(Game {
            game_id: scalars.id,
            round: RoundKey {
                number: scalars.round_number,
                year: scalars.round_year,
            },
            venue: scalars.venue,
            scheduled: scalars.scheduled,
            complete: scalars.complete,
            home: home.into_team()?,
            away: away.into_team()?,
        })
    }

    pub fn started(&self, now: DateTime<Utc>) -> bool {
        now > self.scheduled
    }

    /// `None` = a score is absent, `Some(None)` = a score is void,
    /// `Some(Some(b))` = decided by strict comparison.
    pub fn home_is_winner(&self) -> Option<Option<bool>> {
        match (self.home.score(), self.away.score()) {
            (Score::Unknown, _) | (_, Score::Unknown) => None,
            (Score::Void, _) | (_, Score::Void) => Some(None),
            (Score::Points(h), Score::Points(a)) => Some(Some(h > a)),
        }
    }

    pub fn away_is_winner(&self) -> Option<Option<bool>> {
        match (self.home.score(), self.away.score()) {
            (Score::Unknown, _) | (_, Score::Unknown) => None,
            (Score::Void, _) | (_, Score::Void) => Some(None),
            (Score::Points(h), Score::Points(a)) => Some(Some(a > h)),
        }
    }

    pub fn result_for(&self, home_side: bool) -> MatchResult {
        if home_side {
            compute_winner(self.home.score(), self.away.score())
        } else {
            compute_winner(self.away.score(), self.home.score())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scalars(id: GameId) -> GameJoin {
        GameJoin {
            id,
            venue: "MCG".to_string(),
            scheduled: Utc.with_ymd_and_hms(2022, 5, 14, 9, 40, 0).unwrap(),
            round_year: 2022,
            round_number: 9,
            complete: true,
        }
    }

    fn participant(game_id: GameId, team_id: TeamId, home: bool) -> Participant {
        Participant {
            game_id,
            home,
            team: Some(TeamRef {
                id: team_id,
                team_name: format!("Team {}", team_id),
                abbreviation: None,
            }),
            goals: None,
            behinds: None,
            tips: vec![],
            confidence: None,
        }
    }

    fn scored(mut p: Participant, goals: i64, behinds: i64) -> Participant {
        p.goals = Some(Some(goals));
        p.behinds = Some(Some(behinds));
        p
    }

    #[test]
    fn score_needs_both_components() {
        assert_eq!(compute_score(Some(Some(10)), Some(Some(5))), Score::Points(65));
        assert_eq!(compute_score(None, Some(Some(5))), Score::Unknown);
        assert_eq!(compute_score(Some(Some(10)), None), Score::Unknown);
        assert_eq!(compute_score(Some(None), Some(None)), Score::Void);
    }

    #[test]
    fn zero_score_is_not_unknown() {
        assert_eq!(compute_score(Some(Some(0)), Some(Some(0))), Score::Points(0));
    }

    #[test]
    fn absent_beats_void_when_mixed() {
        // One side imported, the other not even null yet.
        assert_eq!(compute_score(None, Some(None)), Score::Unknown);
        assert_eq!(compute_score(Some(None), Some(Some(3))), Score::Void);
    }

    #[test]
    fn home_win_scenario() {
        let game = Game::new(
            scalars(100),
            vec![
                scored(participant(100, 1, true), 10, 5),
                scored(participant(100, 2, false), 8, 10),
            ],
        )
        .unwrap();
        assert_eq!(game.home.score(), Score::Points(65));
        assert_eq!(game.away.score(), Score::Points(58));
        assert_eq!(game.home_is_winner(), Some(Some(true)));
        assert_eq!(game.away_is_winner(), Some(Some(false)));
        assert_eq!(game.result_for(true), MatchResult::Won);
        assert_eq!(game.result_for(false), MatchResult::Lost);
    }

    #[test]
    fn equal_scores_draw_and_neither_wins() {
        let game = Game::new(
            scalars(101),
            vec![
                scored(participant(101, 1, true), 10, 5),
                scored(participant(101, 2, false), 10, 5),
            ],
        )
        .unwrap();
        assert_eq!(game.home_is_winner(), Some(Some(false)));
        assert_eq!(game.away_is_winner(), Some(Some(false)));
        assert_eq!(game.result_for(true), MatchResult::Drew);
        assert_eq!(game.result_for(false), MatchResult::Drew);
    }

    #[test]
    fn unstarted_game_has_unknown_winner() {
        let game = Game::new(
            scalars(102),
            vec![participant(102, 1, true), participant(102, 2, false)],
        )
        .unwrap();
        assert_eq!(game.home_is_winner(), None);
        assert_eq!(game.result_for(true), MatchResult::Unknown);
    }

    #[test]
    fn voided_game_has_null_winner() {
        let mut home = participant(103, 1, true);
        home.goals = Some(None);
        home.behinds = Some(None);
        let mut away = participant(103, 2, false);
        away.goals = Some(None);
        away.behinds = Some(None);
        let game = Game::new(scalars(103), vec![home, away]).unwrap();
        assert_eq!(game.home_is_winner(), Some(None));
        assert_eq!(game.result_for(false), MatchResult::Unknown);
    }

    #[test]
    fn construction_requires_two_participants() {
        let err = Game::new(scalars(104), vec![participant(104, 1, true)]).unwrap_err();
        assert!(matches!(
            err,
            AppError::MissingParticipants { game_id: 104, count: 1 }
        ));
    }

    #[test]
    fn construction_requires_one_home_flag() {
        let err = Game::new(
            scalars(105),
            vec![participant(105, 1, true), participant(105, 2, true)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::AmbiguousHomeAway { game_id: 105 }));

        let err = Game::new(
            scalars(105),
            vec![participant(105, 1, false), participant(105, 2, false)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::AmbiguousHomeAway { game_id: 105 }));
    }

    #[test]
    fn construction_requires_team_reference() {
        let mut anon = participant(106, 1, true);
        anon.team = None;
        let err = Game::new(scalars(106), vec![anon, participant(106, 2, false)]).unwrap_err();
        assert!(matches!(err, AppError::MissingTeamReference { game_id: 106 }));
    }

    #[test]
    fn started_uses_injected_clock() {
        let game = Game::new(
            scalars(107),
            vec![participant(107, 1, true), participant(107, 2, false)],
        )
        .unwrap();
        let before = Utc.with_ymd_and_hms(2022, 5, 14, 9, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2022, 5, 14, 10, 0, 0).unwrap();
        assert!(!game.started(before));
        assert!(game.started(after));
    }

    #[test]
    fn tipped_matches_person() {
        let mut p = participant(108, 1, true);
        p.tips.push(TipRow {
            person_id: "alice".to_string(),
            game_id: 108,
            team_id: 1,
        });
        let game = Game::new(scalars(108), vec![p, participant(108, 2, false)]).unwrap();
        assert!(game.home.tipped("alice"));
        assert!(!game.home.tipped("bob"));
        assert!(!game.away.tipped("alice"));
    }
}
