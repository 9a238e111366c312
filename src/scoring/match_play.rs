use crate::domain::{MatchOutcome, MatchPick, RankingIndex};
use crate::error::{Result, TiplineError};

use super::rules::{Rule, RuleKind};
use super::{PointBreakdown, RuleAward};

/// Score one match prediction against the recorded outcome.
///
/// Rules apply additively; the event multiplier scales the sum once.
/// A rule kind that cannot apply to a match aborts scoring: the rule
/// set is misconfigured and the whole evaluation must fail rather than
/// short-change anyone.
pub fn score_match(
    pick: &MatchPick,
    outcome: &MatchOutcome,
    multiplier: i32,
    rules: &[Rule],
    rankings: &RankingIndex,
) -> Result<PointBreakdown> {
    let mut awards = Vec::new();

    for rule in rules {
        let points = match &rule.kind {
            RuleKind::ExactScore => {
                (pick.home_score == outcome.home_score && pick.away_score == outcome.away_score)
                    .then_some(rule.points)
            }
            RuleKind::Winner => {
                let predicted = pick.goal_difference().signum();
                let actual =
                    (i32::from(outcome.home_score) - i32::from(outcome.away_score)).signum();
                (predicted == actual).then_some(rule.points)
            }
            RuleKind::GoalDifference => {
                let actual = i32::from(outcome.home_score) - i32::from(outcome.away_score);
                (pick.goal_difference() == actual).then_some(rule.points)
            }
            RuleKind::TotalGoals => {
                (pick.total_goals() == outcome.total_goals()).then_some(rule.points)
            }
            RuleKind::Scorer => scorer_hit(pick, outcome)?.then_some(rule.points),
            RuleKind::ScorerRanked(table) => {
                if scorer_hit(pick, outcome)? {
                    match pick.scorer {
                        Some(player_id) => Some(table.points_for(rankings.rank_of(player_id))),
                        // A correct no-scorer call has no tier; pay the flat value.
                        None => Some(rule.points),
                    }
                } else {
                    None
                }
            }
            other => {
                return Err(TiplineError::PreconditionFailed(format!(
                    "rule {} ({}) does not apply to match events",
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

    Ok(PointBreakdown::new(awards, multiplier))
}

/// Whether the scorer part of the pick matched the outcome.
///
/// An outcome that records goals but carries no scorer list cannot be
/// scored against a scorer rule; that is a data error, not a miss.
fn scorer_hit(pick: &MatchPick, outcome: &MatchOutcome) -> Result<bool> {
    if outcome.total_goals() > 0 && outcome.scorers.is_empty() {
        return Err(TiplineError::PreconditionFailed(
            "outcome records goals but no scorer list".to_string(),
        ));
    }

    if pick.no_scorer {
        return Ok(outcome.is_goalless());
    }

    Ok(pick
        .scorer
        .map_or(false, |player_id| outcome.scorers.contains(&player_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::rules::{RankTier, RankedScorerConfig};
    use std::collections::HashMap;

    fn pick(home: i16, away: i16) -> MatchPick {
        MatchPick {
            home_score: home,
            away_score: away,
            scorer: None,
            no_scorer: false,
        }
    }

    fn outcome(home: i16, away: i16, scorers: Vec<i64>) -> MatchOutcome {
        MatchOutcome {
            home_score: home,
            away_score: away,
            overtime: false,
            shootout: false,
            scorers,
        }
    }

    fn score_shape_rules() -> Vec<Rule> {
        let kinds = [
            (1, "exact_score", RuleKind::ExactScore, 5),
            (2, "winner", RuleKind::Winner, 2),
            (3, "goal_difference", RuleKind::GoalDifference, 3),
            (4, "total_goals", RuleKind::TotalGoals, 1),
        ];
        kinds
            .into_iter()
            .map(|(id, name, kind, points)| Rule {
                id,
                name: name.to_string(),
                points,
                kind,
            })
            .collect()
    }

    fn scorer_rule(points: i32) -> Rule {
        Rule {
            id: 5,
            name: "scorer".to_string(),
            points,
            kind: RuleKind::Scorer,
        }
    }

    #[test]
    fn test_exact_prediction_fires_all_score_shape_rules() {
        // 3-1 predicted, 3-1 actual, {5, 2, 3, 1} -> 11
        let breakdown = score_match(
            &pick(3, 1),
            &outcome(3, 1, vec![7, 8, 9]),
            1,
            &score_shape_rules(),
            &RankingIndex::default(),
        )
        .unwrap();

        assert_eq!(breakdown.awards.len(), 4);
        assert_eq!(breakdown.total, 11);
    }

    #[test]
    fn test_correct_winner_only() {
        // 2-1 predicted, 3-1 actual -> winner only
        let breakdown = score_match(
            &pick(2, 1),
            &outcome(3, 1, vec![7, 8, 9]),
            1,
            &score_shape_rules(),
            &RankingIndex::default(),
        )
        .unwrap();

        assert_eq!(breakdown.awards.len(), 1);
        assert_eq!(breakdown.awards[0].rule, "winner");
        assert_eq!(breakdown.total, 2);
    }

    #[test]
    fn test_draw_only_matches_predicted_draw() {
        let rules = score_shape_rules();
        let actual = outcome(1, 1, vec![7, 8]);

        let on_draw = score_match(&pick(2, 2), &actual, 1, &rules, &RankingIndex::default())
            .unwrap();
        // winner + goal_difference fire, exact and total do not
        assert_eq!(on_draw.total, 5);

        let on_home_win =
            score_match(&pick(2, 1), &actual, 1, &rules, &RankingIndex::default()).unwrap();
        assert_eq!(on_home_win.total, 0);
    }

    #[test]
    fn test_goal_difference_implies_winner_for_non_draw() {
        // 2-0 predicted, 3-1 actual: same difference, same winner,
        // both rules pay independently.
        let breakdown = score_match(
            &pick(2, 0),
            &outcome(3, 1, vec![7, 8, 9]),
            1,
            &score_shape_rules(),
            &RankingIndex::default(),
        )
        .unwrap();

        let fired: Vec<&str> = breakdown.awards.iter().map(|a| a.rule.as_str()).collect();
        assert_eq!(fired, vec!["winner", "goal_difference"]);
        assert_eq!(breakdown.total, 5);
    }

    #[test]
    fn test_scorer_among_actual_scorers() {
        let mut rules = score_shape_rules();
        rules.push(scorer_rule(2));

        let mut p = pick(3, 1);
        p.scorer = Some(101);

        let breakdown = score_match(
            &p,
            &outcome(3, 1, vec![101, 102]),
            1,
            &rules,
            &RankingIndex::default(),
        )
        .unwrap();

        // 11 for the score shape plus 2 for the scorer
        assert_eq!(breakdown.total, 13);
    }

    #[test]
    fn test_no_scorer_matches_only_goalless_games() {
        let rules = vec![scorer_rule(2)];
        let mut p = pick(0, 0);
        p.no_scorer = true;

        let hit = score_match(&p, &outcome(0, 0, vec![]), 1, &rules, &RankingIndex::default())
            .unwrap();
        assert_eq!(hit.total, 2);

        let miss = score_match(
            &p,
            &outcome(1, 0, vec![55]),
            1,
            &rules,
            &RankingIndex::default(),
        )
        .unwrap();
        assert_eq!(miss.total, 0);
    }

    #[test]
    fn test_missing_scorer_list_fails_instead_of_scoring_zero() {
        let rules = vec![scorer_rule(2)];
        let mut p = pick(1, 0);
        p.scorer = Some(101);

        let err = score_match(
            &p,
            &outcome(1, 0, vec![]),
            1,
            &rules,
            &RankingIndex::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TiplineError::PreconditionFailed(_)));
    }

    #[test]
    fn test_ranked_scorer_uses_tier_at_event_time() {
        let table = RankedScorerConfig {
            tiers: vec![
                RankTier { rank: 1, points: 20 },
                RankTier { rank: 2, points: 15 },
            ],
            unranked_points: 5,
        };
        let rules = vec![Rule {
            id: 6,
            name: "scorer_ranked".to_string(),
            points: 0,
            kind: RuleKind::ScorerRanked(table),
        }];

        let mut p = pick(1, 0);
        p.scorer = Some(101);
        let actual = outcome(1, 0, vec![101]);

        let ranked = RankingIndex::new(HashMap::from([(101, 2)]));
        let breakdown = score_match(&p, &actual, 1, &rules, &ranked).unwrap();
        assert_eq!(breakdown.total, 15);

        // No active ranking at event time -> flat unranked fallback.
        let breakdown = score_match(&p, &actual, 1, &rules, &RankingIndex::default()).unwrap();
        assert_eq!(breakdown.total, 5);
    }

    #[test]
    fn test_doubled_event_scales_the_sum_once() {
        let breakdown = score_match(
            &pick(3, 1),
            &outcome(3, 1, vec![7, 8, 9]),
            2,
            &score_shape_rules(),
            &RankingIndex::default(),
        )
        .unwrap();
        assert_eq!(breakdown.total, 22);
        // Per-rule amounts stay unscaled.
        assert_eq!(breakdown.awards[0].points, 5);
    }

    #[test]
    fn test_scoring_is_order_independent() {
        let mut reversed = score_shape_rules();
        reversed.reverse();

        let a = score_match(
            &pick(3, 1),
            &outcome(3, 1, vec![7]),
            1,
            &score_shape_rules(),
            &RankingIndex::default(),
        )
        .unwrap();
        let b = score_match(
            &pick(3, 1),
            &outcome(3, 1, vec![7]),
            1,
            &reversed,
            &RankingIndex::default(),
        )
        .unwrap();

        assert_eq!(a.total, b.total);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let run = || {
            score_match(
                &pick(2, 2),
                &outcome(2, 2, vec![7, 8, 9, 10]),
                1,
                &score_shape_rules(),
                &RankingIndex::default(),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_foreign_rule_kind_aborts() {
        let rules = vec![Rule {
            id: 9,
            name: "group winner".to_string(),
            points: 10,
            kind: RuleKind::GroupStageTeam(crate::scoring::rules::GroupStageConfig {
                winner_points: 10,
                advance_points: 5,
            }),
        }];
        let err = score_match(
            &pick(1, 0),
            &outcome(1, 0, vec![7]),
            1,
            &rules,
            &RankingIndex::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TiplineError::PreconditionFailed(_)));
    }
}
