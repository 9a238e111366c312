use std::collections::HashMap;

use crate::domain::{SpecialOutcome, SpecialPick};
use crate::error::{Result, TiplineError};

use super::rules::{Rule, RuleKind, TiePolicy};
use super::{PointBreakdown, RuleAward};

/// One competing special-bet pick with its pre-resolved context.
///
/// The player's position is looked up by the orchestrator so the
/// engine can enforce position-restricted picks without touching
/// storage.
#[derive(Debug, Clone)]
pub struct SpecialPickCtx {
    pub bet_id: i64,
    pub pick: SpecialPick,
    pub player_position: Option<String>,
}

/// Score the full field of special-bet picks at once.
///
/// Most rules look at one pick at a time, but `closest_value` ranks
/// every competing pick by distance to the actual value, so the whole
/// set is scored together. Returns one breakdown per bet id.
pub fn score_special_set(
    picks: &[SpecialPickCtx],
    outcome: &SpecialOutcome,
    rules: &[Rule],
) -> Result<HashMap<i64, PointBreakdown>> {
    let mut awards: HashMap<i64, Vec<RuleAward>> =
        picks.iter().map(|ctx| (ctx.bet_id, Vec::new())).collect();

    for rule in rules {
        match &rule.kind {
            RuleKind::GroupStageTeam(config) => {
                for ctx in picks {
                    let Some(team_id) = ctx.pick.team_id else {
                        continue;
                    };
                    let points = if outcome.team_id == Some(team_id) {
                        Some(config.winner_points)
                    } else if outcome.advanced_team_ids.contains(&team_id) {
                        Some(config.advance_points)
                    } else {
                        None
                    };
                    if let Some(points) = points {
                        push_award(&mut awards, ctx.bet_id, rule, points);
                    }
                }
            }
            RuleKind::ExactPlayer(config) => {
                let actual = outcome.player_id.ok_or_else(|| {
                    TiplineError::PreconditionFailed(
                        "exact_player rule requires a player outcome".to_string(),
                    )
                })?;
                for ctx in picks {
                    let hit = ctx.pick.player_id == Some(actual)
                        && config.allows(ctx.player_position.as_deref());
                    if hit {
                        push_award(&mut awards, ctx.bet_id, rule, rule.points);
                    }
                }
            }
            RuleKind::ClosestValue(config) => {
                let actual = outcome.value.ok_or_else(|| {
                    TiplineError::PreconditionFailed(
                        "closest_value rule requires a numeric outcome".to_string(),
                    )
                })?;
                for bet_id in closest_bets(picks, actual, config.tie_policy) {
                    push_award(&mut awards, bet_id, rule, rule.points);
                }
            }
            other => {
                return Err(TiplineError::PreconditionFailed(format!(
                    "rule {} ({}) does not apply to special bets",
                    rule.name,
                    other.as_str()
                )))
            }
        }
    }

    Ok(awards
        .into_iter()
        .map(|(bet_id, awards)| (bet_id, PointBreakdown::new(awards, 1)))
        .collect())
}

fn push_award(awards: &mut HashMap<i64, Vec<RuleAward>>, bet_id: i64, rule: &Rule, points: i32) {
    awards.entry(bet_id).or_default().push(RuleAward {
        rule_id: rule.id,
        rule: rule.name.clone(),
        points,
    });
}

/// Bet ids at the minimal absolute distance to the actual value.
fn closest_bets(picks: &[SpecialPickCtx], actual: i64, tie_policy: TiePolicy) -> Vec<i64> {
    let distances: Vec<(i64, i64)> = picks
        .iter()
        .filter_map(|ctx| {
            ctx.pick
                .value
                .map(|value| (ctx.bet_id, (value - actual).abs()))
        })
        .collect();

    let Some(min) = distances.iter().map(|(_, d)| *d).min() else {
        return Vec::new();
    };

    let winners: Vec<i64> = distances
        .iter()
        .filter(|(_, d)| *d == min)
        .map(|(bet_id, _)| *bet_id)
        .collect();

    match tie_policy {
        TiePolicy::Share => winners,
        TiePolicy::None if winners.len() == 1 => winners,
        TiePolicy::None => Vec::new(),
    }
}
