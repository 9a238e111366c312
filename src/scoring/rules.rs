use serde::{Deserialize, Serialize};

use crate::error::{Result, TiplineError};

/// One configured scoring rule of a league.
///
/// Multiple rules of different kinds apply additively to the same
/// event kind; the sum is commutative so their order never matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    /// Flat award for parameterless kinds; parameterized kinds carry
    /// their amounts in the config
    pub points: i32,
    pub kind: RuleKind,
}

/// Closed set of evaluator kinds.
///
/// Kinds that need parameters carry their own typed config, parsed
/// from the stored JSON payload when the rule set is loaded. An
/// unknown kind string or a malformed config is a construction-time
/// error, never a silent zero score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ExactScore,
    Winner,
    GoalDifference,
    TotalGoals,
    Scorer,
    ScorerRanked(RankedScorerConfig),
    GroupStageTeam(GroupStageConfig),
    ExactPlayer(ExactPlayerConfig),
    ClosestValue(ClosestValueConfig),
    Question(QuestionConfig),
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ExactScore => "exact_score",
            RuleKind::Winner => "winner",
            RuleKind::GoalDifference => "goal_difference",
            RuleKind::TotalGoals => "total_goals",
            RuleKind::Scorer => "scorer",
            RuleKind::ScorerRanked(_) => "scorer_ranked",
            RuleKind::GroupStageTeam(_) => "group_stage_team",
            RuleKind::ExactPlayer(_) => "exact_player",
            RuleKind::ClosestValue(_) => "closest_value",
            RuleKind::Question(_) => "question",
        }
    }

    /// Build a kind from its stored representation: the kind string
    /// plus the optional JSON config column.
    pub fn from_parts(kind: &str, config: Option<&serde_json::Value>) -> Result<Self> {
        fn parse<T: serde::de::DeserializeOwned>(
            kind: &str,
            config: Option<&serde_json::Value>,
        ) -> Result<T> {
            let value = config.ok_or_else(|| {
                TiplineError::PreconditionFailed(format!("rule kind {kind} requires a config"))
            })?;
            serde_json::from_value(value.clone()).map_err(|e| {
                TiplineError::PreconditionFailed(format!("malformed {kind} config: {e}"))
            })
        }

        match kind {
            "exact_score" => Ok(RuleKind::ExactScore),
            "winner" => Ok(RuleKind::Winner),
            "goal_difference" => Ok(RuleKind::GoalDifference),
            "total_goals" => Ok(RuleKind::TotalGoals),
            "scorer" => Ok(RuleKind::Scorer),
            "scorer_ranked" => Ok(RuleKind::ScorerRanked(parse(kind, config)?)),
            "group_stage_team" => Ok(RuleKind::GroupStageTeam(parse(kind, config)?)),
            "exact_player" => Ok(RuleKind::ExactPlayer(parse(kind, config)?)),
            "closest_value" => Ok(RuleKind::ClosestValue(parse(kind, config)?)),
            "question" => {
                // The miss penalty is optional; a bare question rule
                // simply awards nothing for a wrong answer.
                let config = match config {
                    Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                        TiplineError::PreconditionFailed(format!("malformed question config: {e}"))
                    })?,
                    None => QuestionConfig::default(),
                };
                Ok(RuleKind::Question(config))
            }
            other => Err(TiplineError::PreconditionFailed(format!(
                "unknown rule kind: {other}"
            ))),
        }
    }
}

/// One rank tier of a ranked-scorer table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTier {
    pub rank: i16,
    pub points: i32,
}

/// Payout table for `scorer_ranked`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedScorerConfig {
    pub tiers: Vec<RankTier>,
    /// Award for a correct scorer with no ranking active at the
    /// event's lock time
    pub unranked_points: i32,
}

impl RankedScorerConfig {
    pub fn points_for(&self, rank: Option<i16>) -> i32 {
        match rank {
            Some(rank) => self
                .tiers
                .iter()
                .find(|tier| tier.rank == rank)
                .map(|tier| tier.points)
                .unwrap_or(self.unranked_points),
            None => self.unranked_points,
        }
    }
}

/// Winner/advance point pair for `group_stage_team`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroupStageConfig {
    pub winner_points: i32,
    pub advance_points: i32,
}

/// Position restriction for `exact_player`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactPlayerConfig {
    /// Position codes eligible for this bet; empty means unrestricted
    #[serde(default)]
    pub allowed_positions: Vec<String>,
}

impl ExactPlayerConfig {
    pub fn allows(&self, position: Option<&str>) -> bool {
        if self.allowed_positions.is_empty() {
            return true;
        }
        position.map_or(false, |p| {
            self.allowed_positions.iter().any(|allowed| allowed == p)
        })
    }
}

/// What happens when several members are equidistant from the actual
/// value in a `closest_value` bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Every tied member receives the full award
    #[default]
    Share,
    /// A tie awards nobody
    None,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClosestValueConfig {
    #[serde(default)]
    pub tie_policy: TiePolicy,
}

/// Miss penalty for `question`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QuestionConfig {
    /// Awarded (usually negative) for a wrong answer
    #[serde(default)]
    pub miss_points: i32,
}
