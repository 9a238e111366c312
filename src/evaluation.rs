//! Atomic evaluation orchestrator.
//!
//! Given one finished event, loads the authoritative outcome, the
//! league's active rule set and every live prediction inside a single
//! SERIALIZABLE transaction, runs the scoring engine and overwrites
//! each prediction's total. Totals are recomputed from scratch on
//! every run, so re-evaluation after an outcome correction yields
//! correct, never compounded, results. Any malformed prediction or
//! rule aborts the whole transaction.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::{EntityKind, LeagueUser};
use crate::error::{Result, TiplineError};
use crate::ports::{
    emit_audit, emit_invalidation, AuditAction, AuditEntry, AuditSink, EntityChanged,
    MembershipResolver, ViewInvalidator,
};
use crate::scoring::{
    score_match, score_question, score_series, score_special_set, RuleAward, SpecialPickCtx,
};
use crate::store::{
    MatchStore, QuestionStore, RuleStore, SeriesStore, SpecialStore, StoreFactory, UnitOfWork,
};

/// Whether a run covers the whole field or a single member's
/// prediction (re-evaluation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationScope {
    AllMembers,
    Member(i64),
}

impl EvaluationScope {
    fn member(&self) -> Option<i64> {
        match self {
            EvaluationScope::AllMembers => None,
            EvaluationScope::Member(id) => Some(*id),
        }
    }
}

/// Scoring result for one member's prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResult {
    pub league_user_id: i64,
    pub bet_id: i64,
    /// Which rules fired and for how much
    pub awards: Vec<RuleAward>,
    pub total_points: i32,
}

/// Outcome of one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub event_id: i64,
    pub kind: EntityKind,
    pub total_users_evaluated: usize,
    /// Sum of every member's total
    pub total_points: i64,
    pub members: Vec<MemberResult>,
    pub duration_ms: u64,
}

/// Runs evaluations on behalf of league administrators
pub struct EvaluationService<F: StoreFactory> {
    store: F,
    membership: Arc<dyn MembershipResolver>,
    audit: Arc<dyn AuditSink>,
    invalidator: Arc<dyn ViewInvalidator>,
}

impl<F: StoreFactory> EvaluationService<F> {
    pub fn new(
        store: F,
        membership: Arc<dyn MembershipResolver>,
        audit: Arc<dyn AuditSink>,
        invalidator: Arc<dyn ViewInvalidator>,
    ) -> Self {
        Self {
            store,
            membership,
            audit,
            invalidator,
        }
    }

    /// Evaluate a match event.
    #[instrument(skip(self))]
    pub async fn evaluate_match(
        &self,
        actor_user_id: i64,
        event_id: i64,
        scope: EvaluationScope,
    ) -> Result<EvaluationReport> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .match_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("match event {event_id}")))?;
        self.require_admin(actor_user_id, event.league_id).await?;

        let outcome = event.outcome.as_ref().ok_or_else(|| {
            TiplineError::PreconditionFailed(format!(
                "match event {event_id} has no recorded outcome"
            ))
        })?;

        let rules = loaded_rules(&mut uow, event.league_id, EntityKind::Match).await?;
        let bets = uow.match_bets_for_event(event_id, scope.member()).await?;
        require_scoped_bet(&scope, bets.len())?;

        // Rankings are read as of the lock time, so later ranking
        // changes never rewrite this event's scoring.
        let scorer_ids: Vec<i64> = bets
            .iter()
            .filter_map(|bet| bet.pick.scorer)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let rankings = uow.scorer_rankings_at(&scorer_ids, event.lock_time).await?;

        let mut members = Vec::with_capacity(bets.len());
        for bet in &bets {
            let breakdown =
                score_match(&bet.pick, outcome, event.multiplier(), &rules, &rankings)?;
            uow.set_match_bet_points(bet.id, breakdown.total).await?;
            members.push(MemberResult {
                league_user_id: bet.league_user_id,
                bet_id: bet.id,
                awards: breakdown.awards,
                total_points: breakdown.total,
            });
        }

        if scope == EvaluationScope::AllMembers {
            uow.mark_evaluated(EntityKind::Match, event_id).await?;
        }
        uow.commit().await?;

        let report = build_report(event_id, EntityKind::Match, members, started);
        self.after_commit(actor_user_id, event.league_id, &report).await;
        Ok(report)
    }

    /// Evaluate a series event.
    #[instrument(skip(self))]
    pub async fn evaluate_series(
        &self,
        actor_user_id: i64,
        event_id: i64,
        scope: EvaluationScope,
    ) -> Result<EvaluationReport> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .series_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("series event {event_id}")))?;
        self.require_admin(actor_user_id, event.league_id).await?;

        let outcome = event.outcome.ok_or_else(|| {
            TiplineError::PreconditionFailed(format!(
                "series event {event_id} has no recorded outcome"
            ))
        })?;

        // A recorded series result must itself be a finished series.
        let required = event.required_wins();
        if outcome.home_wins.max(outcome.away_wins) != required
            || outcome.home_wins.min(outcome.away_wins) >= required
        {
            return Err(TiplineError::PreconditionFailed(format!(
                "series outcome {}:{} is not a decided best-of-{}",
                outcome.home_wins, outcome.away_wins, event.best_of
            )));
        }

        let rules = loaded_rules(&mut uow, event.league_id, EntityKind::Series).await?;
        let bets = uow.series_bets_for_event(event_id, scope.member()).await?;
        require_scoped_bet(&scope, bets.len())?;

        let mut members = Vec::with_capacity(bets.len());
        for bet in &bets {
            let breakdown = score_series(&bet.pick, &outcome, &rules)?;
            uow.set_series_bet_points(bet.id, breakdown.total).await?;
            members.push(MemberResult {
                league_user_id: bet.league_user_id,
                bet_id: bet.id,
                awards: breakdown.awards,
                total_points: breakdown.total,
            });
        }

        if scope == EvaluationScope::AllMembers {
            uow.mark_evaluated(EntityKind::Series, event_id).await?;
        }
        uow.commit().await?;

        let report = build_report(event_id, EntityKind::Series, members, started);
        self.after_commit(actor_user_id, event.league_id, &report).await;
        Ok(report)
    }

    /// Evaluate a special bet.
    ///
    /// Closest-value rules rank the entire field, so a member-scoped
    /// run still loads every pick and persists only the target
    /// member's total.
    #[instrument(skip(self))]
    pub async fn evaluate_special(
        &self,
        actor_user_id: i64,
        event_id: i64,
        scope: EvaluationScope,
    ) -> Result<EvaluationReport> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .special_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("special event {event_id}")))?;
        self.require_admin(actor_user_id, event.league_id).await?;

        let outcome = event.outcome.as_ref().ok_or_else(|| {
            TiplineError::PreconditionFailed(format!(
                "special event {event_id} has no recorded outcome"
            ))
        })?;

        let rules = loaded_rules(&mut uow, event.league_id, EntityKind::Special).await?;
        let bets = uow.special_bets_for_event(event_id, None).await?;
        let scoped: Vec<_> = match scope.member() {
            Some(member) => bets
                .iter()
                .filter(|bet| bet.league_user_id == member)
                .collect(),
            None => bets.iter().collect(),
        };
        require_scoped_bet(&scope, scoped.len())?;

        let player_ids: Vec<i64> = bets
            .iter()
            .filter_map(|bet| bet.pick.player_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let positions = uow.player_positions(&player_ids).await?;

        let contexts: Vec<SpecialPickCtx> = bets
            .iter()
            .map(|bet| SpecialPickCtx {
                bet_id: bet.id,
                pick: bet.pick.clone(),
                player_position: bet
                    .pick
                    .player_id
                    .and_then(|id| positions.get(&id).cloned()),
            })
            .collect();

        let mut breakdowns = score_special_set(&contexts, outcome, &rules)?;

        let mut members = Vec::with_capacity(scoped.len());
        for bet in scoped {
            let breakdown = breakdowns.remove(&bet.id).ok_or_else(|| {
                TiplineError::Internal(format!("no breakdown computed for bet {}", bet.id))
            })?;
            uow.set_special_bet_points(bet.id, breakdown.total).await?;
            members.push(MemberResult {
                league_user_id: bet.league_user_id,
                bet_id: bet.id,
                awards: breakdown.awards,
                total_points: breakdown.total,
            });
        }

        if scope == EvaluationScope::AllMembers {
            uow.mark_evaluated(EntityKind::Special, event_id).await?;
        }
        uow.commit().await?;

        let report = build_report(event_id, EntityKind::Special, members, started);
        self.after_commit(actor_user_id, event.league_id, &report).await;
        Ok(report)
    }

    /// Evaluate a question.
    #[instrument(skip(self))]
    pub async fn evaluate_question(
        &self,
        actor_user_id: i64,
        event_id: i64,
        scope: EvaluationScope,
    ) -> Result<EvaluationReport> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .question_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("question event {event_id}")))?;
        self.require_admin(actor_user_id, event.league_id).await?;

        let outcome = event.outcome.ok_or_else(|| {
            TiplineError::PreconditionFailed(format!(
                "question event {event_id} has no recorded outcome"
            ))
        })?;

        let rules = loaded_rules(&mut uow, event.league_id, EntityKind::Question).await?;
        let bets = uow.question_bets_for_event(event_id, scope.member()).await?;
        require_scoped_bet(&scope, bets.len())?;

        let mut members = Vec::with_capacity(bets.len());
        for bet in &bets {
            let breakdown = score_question(&bet.pick, outcome, &rules)?;
            uow.set_question_bet_points(bet.id, breakdown.total).await?;
            members.push(MemberResult {
                league_user_id: bet.league_user_id,
                bet_id: bet.id,
                awards: breakdown.awards,
                total_points: breakdown.total,
            });
        }

        if scope == EvaluationScope::AllMembers {
            uow.mark_evaluated(EntityKind::Question, event_id).await?;
        }
        uow.commit().await?;

        let report = build_report(event_id, EntityKind::Question, members, started);
        self.after_commit(actor_user_id, event.league_id, &report).await;
        Ok(report)
    }

    /// Evaluation is an administrative action within the league.
    async fn require_admin(&self, user_id: i64, league_id: i64) -> Result<LeagueUser> {
        let member = self
            .membership
            .resolve(user_id, league_id)
            .await?
            .ok_or_else(|| {
                TiplineError::Forbidden(format!(
                    "user {user_id} is not a member of league {league_id}"
                ))
            })?;

        if !member.is_active() || !member.is_admin() {
            return Err(TiplineError::Forbidden(format!(
                "user {user_id} is not an administrator of league {league_id}"
            )));
        }

        Ok(member)
    }

    async fn after_commit(&self, actor_user_id: i64, league_id: i64, report: &EvaluationReport) {
        info!(
            event_id = report.event_id,
            kind = %report.kind,
            users = report.total_users_evaluated,
            points = report.total_points,
            duration_ms = report.duration_ms,
            "evaluation complete"
        );

        emit_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                actor_user_id,
                Some(league_id),
                report.event_id,
                AuditAction::EventEvaluated,
                json!({
                    "kind": report.kind.as_str(),
                    "total_users_evaluated": report.total_users_evaluated,
                    "total_points": report.total_points,
                }),
                report.duration_ms,
            ),
        )
        .await;

        emit_invalidation(
            self.invalidator.as_ref(),
            EntityChanged {
                league_id,
                kind: report.kind,
            },
        )
        .await;
    }
}

/// Load and parse the active rule set; an empty set is a
/// misconfiguration, not a license to award nothing.
async fn loaded_rules<U: UnitOfWork>(
    uow: &mut U,
    league_id: i64,
    kind: EntityKind,
) -> Result<Vec<crate::scoring::Rule>> {
    let rules = uow.rules_for(league_id, kind).await?;
    if rules.is_empty() {
        return Err(TiplineError::PreconditionFailed(format!(
            "league {league_id} has no active {kind} rules"
        )));
    }
    Ok(rules)
}

/// A member-scoped run must target an existing prediction.
fn require_scoped_bet(scope: &EvaluationScope, found: usize) -> Result<()> {
    if let EvaluationScope::Member(member) = scope {
        if found == 0 {
            return Err(TiplineError::NotFound(format!(
                "no prediction by member {member} for this event"
            )));
        }
    }
    Ok(())
}

fn build_report(
    event_id: i64,
    kind: EntityKind,
    members: Vec<MemberResult>,
    started: Instant,
) -> EvaluationReport {
    let total_points = members.iter().map(|m| i64::from(m.total_points)).sum();
    EvaluationReport {
        event_id,
        kind,
        total_users_evaluated: members.len(),
        total_points,
        members,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
