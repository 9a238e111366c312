use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{SeriesEvent, SpecialBetKind};
use super::league::Sport;
use crate::error::{Result, TiplineError};

/// Predicted match result as entered by a member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPick {
    pub home_score: i16,
    pub away_score: i16,
    /// Predicted goal scorer, when the league plays with scorer rules
    pub scorer: Option<i64>,
    /// Explicit assertion that nobody scores (goalless game)
    pub no_scorer: bool,
}

impl MatchPick {
    /// Shape and business validation, sport-aware.
    ///
    /// Team membership of the predicted scorer is checked separately
    /// by the submission protocol since it needs a roster lookup.
    pub fn validate(&self, sport: Sport) -> Result<()> {
        if self.home_score < 0 || self.away_score < 0 {
            return Err(TiplineError::Validation(format!(
                "scores must be non-negative, got {}:{}",
                self.home_score, self.away_score
            )));
        }

        if self.scorer.is_some() && self.no_scorer {
            return Err(TiplineError::Validation(
                "a scorer pick and a no-scorer assertion are mutually exclusive".to_string(),
            ));
        }

        if self.no_scorer && !sport.allows_scoreless() {
            return Err(TiplineError::Validation(format!(
                "{sport} games always have a scorer, a no-scorer pick is invalid"
            )));
        }

        if self.no_scorer && (self.home_score != 0 || self.away_score != 0) {
            return Err(TiplineError::Validation(
                "a no-scorer pick requires a goalless predicted score".to_string(),
            ));
        }

        Ok(())
    }

    pub fn goal_difference(&self) -> i32 {
        i32::from(self.home_score) - i32::from(self.away_score)
    }

    pub fn total_goals(&self) -> i32 {
        i32::from(self.home_score) + i32::from(self.away_score)
    }
}

/// Predicted best-of-N series result
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesPick {
    pub home_wins: i16,
    pub away_wins: i16,
}

impl SeriesPick {
    /// A series pick must describe a finished series: the winner at
    /// exactly the required win count, the loser below it.
    pub fn validate(&self, event: &SeriesEvent) -> Result<()> {
        if self.home_wins < 0 || self.away_wins < 0 {
            return Err(TiplineError::Validation(format!(
                "series wins must be non-negative, got {}:{}",
                self.home_wins, self.away_wins
            )));
        }

        let required = event.required_wins();
        let (winner, loser) = if self.home_wins >= self.away_wins {
            (self.home_wins, self.away_wins)
        } else {
            (self.away_wins, self.home_wins)
        };

        if winner != required || loser >= required {
            return Err(TiplineError::Validation(format!(
                "result {}:{} is not a valid best-of-{} outcome",
                self.home_wins, self.away_wins, event.best_of
            )));
        }

        Ok(())
    }
}

/// Predicted special bet answer; which field is set depends on the
/// event's sub-type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialPick {
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub value: Option<i64>,
}

impl SpecialPick {
    pub fn validate(&self, kind: SpecialBetKind) -> Result<()> {
        let (expected, present) = match kind {
            SpecialBetKind::Team => ("team_id", self.team_id.is_some()),
            SpecialBetKind::Player => ("player_id", self.player_id.is_some()),
            SpecialBetKind::Value => ("value", self.value.is_some()),
        };

        if !present {
            return Err(TiplineError::Validation(format!(
                "a {kind:?} special bet requires {expected}"
            )));
        }

        let set_fields = [
            self.team_id.is_some(),
            self.player_id.is_some(),
            self.value.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if set_fields != 1 {
            return Err(TiplineError::Validation(
                "a special bet pick must set exactly one field".to_string(),
            ));
        }

        Ok(())
    }
}

/// Predicted yes/no answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuestionPick {
    pub answer: bool,
}

/// Stored match prediction, one per (member, event)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBet {
    pub id: i64,
    pub league_user_id: i64,
    pub event_id: i64,
    pub pick: MatchPick,
    /// Written only by the evaluation run
    pub total_points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Stored series prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesBet {
    pub id: i64,
    pub league_user_id: i64,
    pub event_id: i64,
    pub pick: SeriesPick,
    pub total_points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Stored special bet prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialBet {
    pub id: i64,
    pub league_user_id: i64,
    pub event_id: i64,
    pub pick: SpecialPick,
    pub total_points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Stored question prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBet {
    pub id: i64,
    pub league_user_id: i64,
    pub event_id: i64,
    pub pick: QuestionPick,
    pub total_points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
