use crate::domain::QuestionPick;
use crate::error::{Result, TiplineError};

use super::rules::{Rule, RuleKind};
use super::{PointBreakdown, RuleAward};

/// Score one yes/no prediction.
///
/// A correct answer earns the rule's points; a wrong answer earns the
/// configured miss penalty (usually zero or negative).
pub fn score_question(
    pick: &QuestionPick,
    outcome: bool,
    rules: &[Rule],
) -> Result<PointBreakdown> {
    let mut awards = Vec::new();

    for rule in rules {
        let points = match &rule.kind {
            RuleKind::Question(config) => {
                if pick.answer == outcome {
                    Some(rule.points)
                } else if config.miss_points != 0 {
                    Some(config.miss_points)
                } else {
                    None
                }
            }
            other => {
                return Err(TiplineError::PreconditionFailed(format!(
                    "rule {} ({}) does not apply to questions",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::rules::QuestionConfig;

    fn rule(points: i32, miss_points: i32) -> Rule {
        Rule {
            id: 1,
            name: "question".to_string(),
            points,
            kind: RuleKind::Question(QuestionConfig { miss_points }),
        }
    }

    #[test]
    fn test_correct_answer() {
        let breakdown =
            score_question(&QuestionPick { answer: true }, true, &[rule(6, -3)]).unwrap();
        assert_eq!(breakdown.total, 6);
    }

    #[test]
    fn test_wrong_answer_takes_the_penalty() {
        let breakdown =
            score_question(&QuestionPick { answer: false }, true, &[rule(6, -3)]).unwrap();
        assert_eq!(breakdown.total, -3);
    }

    #[test]
    fn test_wrong_answer_without_penalty_scores_nothing() {
        let breakdown =
            score_question(&QuestionPick { answer: false }, true, &[rule(6, 0)]).unwrap();
        assert!(breakdown.awards.is_empty());
        assert_eq!(breakdown.total, 0);
    }

    #[test]
    fn test_match_kind_rejected_for_questions() {
        let foreign = Rule {
            id: 2,
            name: "winner".to_string(),
            points: 2,
            kind: RuleKind::Winner,
        };
        let err = score_question(&QuestionPick { answer: true }, true, &[foreign]).unwrap_err();
        assert!(matches!(err, TiplineError::PreconditionFailed(_)));
    }
}
