use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::league::Sport;

/// Tag distinguishing the four predictable event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Match,
    Series,
    Special,
    Question,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Match => "match",
            EntityKind::Series => "series",
            EntityKind::Special => "special",
            EntityKind::Question => "question",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for EntityKind {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "match" => Ok(EntityKind::Match),
            "series" => Ok(EntityKind::Series),
            "special" => Ok(EntityKind::Special),
            "question" => Ok(EntityKind::Question),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// Lifecycle phase of an event.
///
/// `Scheduled -> Locked` is a pure time predicate on the lock time and
/// is never stored. `Resulted` means the authoritative outcome has
/// been recorded; `Evaluated` is set by the evaluation run. Correcting
/// an outcome resets the evaluated flag, reopening the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPhase {
    Scheduled,
    Locked,
    Resulted,
    Evaluated,
}

pub(crate) fn event_phase(
    now: DateTime<Utc>,
    lock_time: DateTime<Utc>,
    has_outcome: bool,
    is_evaluated: bool,
) -> EventPhase {
    if has_outcome {
        if is_evaluated {
            EventPhase::Evaluated
        } else {
            EventPhase::Resulted
        }
    } else if now < lock_time {
        EventPhase::Scheduled
    } else {
        EventPhase::Locked
    }
}

/// Authoritative result of a match, recorded after the final whistle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Regulation-time score
    pub home_score: i16,
    pub away_score: i16,
    pub overtime: bool,
    pub shootout: bool,
    /// Player ids credited with a goal. Empty only for a goalless game.
    pub scorers: Vec<i64>,
}

impl MatchOutcome {
    pub fn total_goals(&self) -> i32 {
        i32::from(self.home_score) + i32::from(self.away_score)
    }

    pub fn is_goalless(&self) -> bool {
        self.home_score == 0 && self.away_score == 0
    }
}

/// A single game between two teams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: i64,
    pub league_id: i64,
    pub sport: Sport,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub lock_time: DateTime<Utc>,
    /// Event-level multiplier flag: total awarded points are doubled
    pub doubled: bool,
    pub outcome: Option<MatchOutcome>,
    pub is_evaluated: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MatchEvent {
    pub fn phase(&self, now: DateTime<Utc>) -> EventPhase {
        event_phase(now, self.lock_time, self.outcome.is_some(), self.is_evaluated)
    }

    pub fn multiplier(&self) -> i32 {
        if self.doubled {
            2
        } else {
            1
        }
    }
}

/// Result of a best-of-N series
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesOutcome {
    pub home_wins: i16,
    pub away_wins: i16,
}

/// A best-of-N playoff series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEvent {
    pub id: i64,
    pub league_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub best_of: i16,
    pub lock_time: DateTime<Utc>,
    pub outcome: Option<SeriesOutcome>,
    pub is_evaluated: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SeriesEvent {
    /// Wins needed to take the series (e.g. 4 in a best-of-7)
    pub fn required_wins(&self) -> i16 {
        self.best_of / 2 + 1
    }

    pub fn phase(&self, now: DateTime<Utc>) -> EventPhase {
        event_phase(now, self.lock_time, self.outcome.is_some(), self.is_evaluated)
    }
}

/// Sub-type of a special bet, fixing which payload field is meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialBetKind {
    /// Pick a team (e.g. group winner)
    Team,
    /// Pick a player (e.g. top scorer of the tournament)
    Player,
    /// Pick a number (e.g. total goals in the group stage)
    Value,
}

impl SpecialBetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialBetKind::Team => "team",
            SpecialBetKind::Player => "player",
            SpecialBetKind::Value => "value",
        }
    }
}

impl TryFrom<&str> for SpecialBetKind {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "team" => Ok(SpecialBetKind::Team),
            "player" => Ok(SpecialBetKind::Player),
            "value" => Ok(SpecialBetKind::Value),
            other => Err(format!("unknown special bet kind: {other}")),
        }
    }
}

/// Authoritative result of a special bet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialOutcome {
    /// Winning team for team picks (e.g. the group winner)
    pub team_id: Option<i64>,
    /// Teams that advanced without winning the group
    pub advanced_team_ids: Vec<i64>,
    /// Correct player for player picks
    pub player_id: Option<i64>,
    /// Actual number for value picks
    pub value: Option<i64>,
}

/// A one-off special bet within a league season
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialEvent {
    pub id: i64,
    pub league_id: i64,
    pub bet_kind: SpecialBetKind,
    pub lock_time: DateTime<Utc>,
    pub outcome: Option<SpecialOutcome>,
    pub is_evaluated: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SpecialEvent {
    pub fn phase(&self, now: DateTime<Utc>) -> EventPhase {
        event_phase(now, self.lock_time, self.outcome.is_some(), self.is_evaluated)
    }
}

/// A yes/no question members bet on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEvent {
    pub id: i64,
    pub league_id: i64,
    pub text: String,
    pub lock_time: DateTime<Utc>,
    pub outcome: Option<bool>,
    pub is_evaluated: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl QuestionEvent {
    pub fn phase(&self, now: DateTime<Utc>) -> EventPhase {
        event_phase(now, self.lock_time, self.outcome.is_some(), self.is_evaluated)
    }
}
