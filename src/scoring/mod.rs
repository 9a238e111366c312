//! Pure scoring engine.
//!
//! Every function here is side-effect free: picks, outcomes, rules and
//! ranking lookups arrive fully resolved from the orchestrator, and the
//! output is a point breakdown. Nothing in this module touches storage.

pub mod match_play;
pub mod question;
pub mod rules;
pub mod series;
pub mod special;

pub use match_play::score_match;
pub use question::score_question;
pub use rules::{
    ClosestValueConfig, ExactPlayerConfig, GroupStageConfig, QuestionConfig, RankTier,
    RankedScorerConfig, Rule, RuleKind, TiePolicy,
};
pub use series::score_series;
pub use special::{score_special_set, SpecialPickCtx};

use serde::{Deserialize, Serialize};

/// One rule that fired for one prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAward {
    pub rule_id: i64,
    pub rule: String,
    pub points: i32,
}

/// Full scoring result for one prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointBreakdown {
    pub awards: Vec<RuleAward>,
    /// Event-level multiplier applied once to the sum, never per rule
    pub multiplier: i32,
    pub total: i32,
}

impl PointBreakdown {
    pub fn new(awards: Vec<RuleAward>, multiplier: i32) -> Self {
        let total: i32 = awards.iter().map(|award| award.points).sum::<i32>() * multiplier;
        Self {
            awards,
            multiplier,
            total,
        }
    }

    pub fn empty(multiplier: i32) -> Self {
        Self::new(Vec::new(), multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn award(points: i32) -> RuleAward {
        RuleAward {
            rule_id: 1,
            rule: "exact_score".to_string(),
            points,
        }
    }

    #[test]
    fn test_multiplier_scales_the_sum_once() {
        let breakdown = PointBreakdown::new(vec![award(5), award(3)], 2);
        assert_eq!(breakdown.total, 16);
        // The per-rule amounts stay unscaled in the breakdown.
        assert_eq!(breakdown.awards[0].points, 5);
    }

    #[test]
    fn test_negative_awards_sum_through() {
        let breakdown = PointBreakdown::new(vec![award(-3)], 1);
        assert_eq!(breakdown.total, -3);
    }
}
