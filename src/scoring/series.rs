use crate::domain::{SeriesOutcome, SeriesPick};
use crate::error::{Result, TiplineError};

use super::rules::{Rule, RuleKind};
use super::{PointBreakdown, RuleAward};

/// Score one series prediction.
///
/// A best-of-N series has no draw: `exact_score` matches the exact
/// win counts, `winner` the side that took the series.
pub fn score_series(
    pick: &SeriesPick,
    outcome: &SeriesOutcome,
    rules: &[Rule],
) -> Result<PointBreakdown> {
    let mut awards = Vec::new();

    for rule in rules {
        let points = match &rule.kind {
            RuleKind::ExactScore => {
                (pick.home_wins == outcome.home_wins && pick.away_wins == outcome.away_wins)
                    .then_some(rule.points)
            }
            RuleKind::Winner => {
                let predicted = (i32::from(pick.home_wins) - i32::from(pick.away_wins)).signum();
                let actual =
                    (i32::from(outcome.home_wins) - i32::from(outcome.away_wins)).signum();
                (predicted == actual).then_some(rule.points)
            }
            other => {
                return Err(TiplineError::PreconditionFailed(format!(
                    "rule {} ({}) does not apply to series events",
                    rule.name,
                    other.as_str()
                )))
            }
        };

        if let Some(points) = points {
            awards.push(RuleAward {
                rule_id: rule.id,
                rule: rule.name.clone(),
                points,
            });
        }
    }

    Ok(PointBreakdown::new(awards, 1))
}
