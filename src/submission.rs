//! Bet submission protocol.
//!
//! The deadline-aware upsert that lets a league member submit or amend
//! one prediction per event. All checks and the write run inside a
//! single SERIALIZABLE unit of work: two concurrent submissions for
//! the same (member, event) settle to exactly one row, and a
//! submission racing the lock-time boundary either fully succeeds or
//! fails with no partial write.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::{
    EntityKind, LeagueUser, MatchPick, QuestionPick, SeriesPick, SpecialPick,
};
use crate::error::{Result, TiplineError};
use crate::ports::{
    emit_audit, emit_invalidation, AuditAction, AuditEntry, AuditSink, EntityChanged,
    MembershipResolver, ViewInvalidator,
};
use crate::store::{
    MatchStore, QuestionStore, RuleStore, SeriesStore, SpecialStore, StoreFactory, UnitOfWork,
};

/// Whether the submission created a fresh prediction or amended an
/// existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub bet_id: i64,
    pub outcome: SubmissionOutcome,
}

/// Accepts member predictions ahead of each event's lock time
pub struct SubmissionService<F: StoreFactory> {
    store: F,
    membership: Arc<dyn MembershipResolver>,
    audit: Arc<dyn AuditSink>,
    invalidator: Arc<dyn ViewInvalidator>,
}

impl<F: StoreFactory> SubmissionService<F> {
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

    /// Submit or amend a match prediction.
    #[instrument(skip(self, pick))]
    pub async fn submit_match_bet(
        &self,
        user_id: i64,
        event_id: i64,
        pick: MatchPick,
    ) -> Result<SubmissionReceipt> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .match_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("match event {event_id}")))?;

        let member = self.active_member(user_id, event.league_id).await?;
        check_deadline(event_id, event.lock_time)?;
        pick.validate(event.sport)?;

        // Roster check needs storage, so it runs after the pure validation.
        if let Some(scorer) = pick.scorer {
            let on_roster = uow
                .player_in_teams(scorer, &[event.home_team_id, event.away_team_id])
                .await?;
            if !on_roster {
                return Err(TiplineError::Validation(format!(
                    "scorer {scorer} plays for neither competing team"
                )));
            }
        }

        let existing = uow.find_match_bet(member.id, event_id).await?;
        let receipt = match existing {
            Some(bet) => {
                uow.update_match_bet(bet.id, &pick).await?;
                SubmissionReceipt {
                    bet_id: bet.id,
                    outcome: SubmissionOutcome::Updated,
                }
            }
            None => {
                let bet_id = uow.insert_match_bet(member.id, event_id, &pick).await?;
                SubmissionReceipt {
                    bet_id,
                    outcome: SubmissionOutcome::Created,
                }
            }
        };
        uow.commit().await?;

        self.after_commit(
            user_id,
            event.league_id,
            event_id,
            EntityKind::Match,
            &receipt,
            started,
        )
        .await;
        Ok(receipt)
    }

    /// Submit or amend a series prediction.
    #[instrument(skip(self, pick))]
    pub async fn submit_series_bet(
        &self,
        user_id: i64,
        event_id: i64,
        pick: SeriesPick,
    ) -> Result<SubmissionReceipt> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .series_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("series event {event_id}")))?;

        let member = self.active_member(user_id, event.league_id).await?;
        check_deadline(event_id, event.lock_time)?;
        pick.validate(&event)?;

        let existing = uow.find_series_bet(member.id, event_id).await?;
        let receipt = match existing {
            Some(bet) => {
                uow.update_series_bet(bet.id, &pick).await?;
                SubmissionReceipt {
                    bet_id: bet.id,
                    outcome: SubmissionOutcome::Updated,
                }
            }
            None => {
                let bet_id = uow.insert_series_bet(member.id, event_id, &pick).await?;
                SubmissionReceipt {
                    bet_id,
                    outcome: SubmissionOutcome::Created,
                }
            }
        };
        uow.commit().await?;

        self.after_commit(
            user_id,
            event.league_id,
            event_id,
            EntityKind::Series,
            &receipt,
            started,
        )
        .await;
        Ok(receipt)
    }

    /// Submit or amend a special-bet prediction.
    #[instrument(skip(self, pick))]
    pub async fn submit_special_bet(
        &self,
        user_id: i64,
        event_id: i64,
        pick: SpecialPick,
    ) -> Result<SubmissionReceipt> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .special_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("special event {event_id}")))?;

        let member = self.active_member(user_id, event.league_id).await?;
        check_deadline(event_id, event.lock_time)?;
        pick.validate(event.bet_kind)?;

        let existing = uow.find_special_bet(member.id, event_id).await?;
        let receipt = match existing {
            Some(bet) => {
                uow.update_special_bet(bet.id, &pick).await?;
                SubmissionReceipt {
                    bet_id: bet.id,
                    outcome: SubmissionOutcome::Updated,
                }
            }
            None => {
                let bet_id = uow.insert_special_bet(member.id, event_id, &pick).await?;
                SubmissionReceipt {
                    bet_id,
                    outcome: SubmissionOutcome::Created,
                }
            }
        };
        uow.commit().await?;

        self.after_commit(
            user_id,
            event.league_id,
            event_id,
            EntityKind::Special,
            &receipt,
            started,
        )
        .await;
        Ok(receipt)
    }

    /// Submit or amend a question prediction.
    #[instrument(skip(self, pick))]
    pub async fn submit_question_bet(
        &self,
        user_id: i64,
        event_id: i64,
        pick: QuestionPick,
    ) -> Result<SubmissionReceipt> {
        let started = Instant::now();
        let mut uow = self.store.begin_serializable().await?;

        let event = uow
            .question_event(event_id)
            .await?
            .ok_or_else(|| TiplineError::NotFound(format!("question event {event_id}")))?;

        let member = self.active_member(user_id, event.league_id).await?;
        check_deadline(event_id, event.lock_time)?;

        let existing = uow.find_question_bet(member.id, event_id).await?;
        let receipt = match existing {
            Some(bet) => {
                uow.update_question_bet(bet.id, &pick).await?;
                SubmissionReceipt {
                    bet_id: bet.id,
                    outcome: SubmissionOutcome::Updated,
                }
            }
            None => {
                let bet_id = uow.insert_question_bet(member.id, event_id, &pick).await?;
                SubmissionReceipt {
                    bet_id,
                    outcome: SubmissionOutcome::Created,
                }
            }
        };
        uow.commit().await?;

        self.after_commit(
            user_id,
            event.league_id,
            event_id,
            EntityKind::Question,
            &receipt,
            started,
        )
        .await;
        Ok(receipt)
    }

    /// Resolve the caller to an active membership of the event's league.
    async fn active_member(&self, user_id: i64, league_id: i64) -> Result<LeagueUser> {
        let member = self
            .membership
            .resolve(user_id, league_id)
            .await?
            .ok_or_else(|| {
                TiplineError::Forbidden(format!(
                    "user {user_id} is not a member of league {league_id}"
                ))
            })?;

        if !member.is_active() {
            return Err(TiplineError::Forbidden(format!(
                "membership of user {user_id} in league {league_id} is inactive"
            )));
        }

        Ok(member)
    }

    /// Best-effort side effects after a successful commit.
    async fn after_commit(
        &self,
        user_id: i64,
        league_id: i64,
        event_id: i64,
        kind: EntityKind,
        receipt: &SubmissionReceipt,
        started: Instant,
    ) {
        info!(
            user_id,
            event_id,
            kind = %kind,
            outcome = ?receipt.outcome,
            "bet submission accepted"
        );

        let action = match receipt.outcome {
            SubmissionOutcome::Created => AuditAction::BetCreated,
            SubmissionOutcome::Updated => AuditAction::BetUpdated,
        };
        emit_audit(
            self.audit.as_ref(),
            AuditEntry::new(
                user_id,
                Some(league_id),
                event_id,
                action,
                json!({ "bet_id": receipt.bet_id, "kind": kind.as_str() }),
                started.elapsed().as_millis() as u64,
            ),
        )
        .await;

        emit_invalidation(
            self.invalidator.as_ref(),
            EntityChanged { league_id, kind },
        )
        .await;
    }
}

/// Betting is open strictly before the lock time.
fn check_deadline(event_id: i64, lock_time: chrono::DateTime<Utc>) -> Result<()> {
    if Utc::now() >= lock_time {
        return Err(TiplineError::BettingClosed {
            event_id,
            lock_time,
        });
    }
    Ok(())
}
