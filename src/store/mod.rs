//! Prediction store access.
//!
//! Entity-specific repository traits plus an explicit unit-of-work
//! seam: the submission protocol and the evaluation orchestrator only
//! ever talk to these traits, so they run against PostgreSQL in
//! production and an in-memory fake in tests.

pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    EntityKind, MatchBet, MatchEvent, MatchPick, QuestionBet, QuestionEvent, QuestionPick,
    RankingIndex, SeriesBet, SeriesEvent, SeriesPick, SpecialBet, SpecialEvent, SpecialPick,
};
use crate::error::Result;
use crate::scoring::Rule;

pub use postgres::PostgresStore;

/// Repository over match events and match predictions
#[async_trait]
pub trait MatchStore {
    /// Load a live (non-deleted) match event
    async fn match_event(&mut self, event_id: i64) -> Result<Option<MatchEvent>>;

    async fn find_match_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<MatchBet>>;

    /// Create a prediction with zero points; returns the new bet id
    async fn insert_match_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &MatchPick,
    ) -> Result<i64>;

    /// Amend the pick fields of an existing prediction, never its points
    async fn update_match_bet(&mut self, bet_id: i64, pick: &MatchPick) -> Result<()>;

    /// All live predictions for an event, optionally scoped to one member
    async fn match_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<MatchBet>>;

    async fn set_match_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()>;
}

/// Repository over series events and series predictions
#[async_trait]
pub trait SeriesStore {
    async fn series_event(&mut self, event_id: i64) -> Result<Option<SeriesEvent>>;

    async fn find_series_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<SeriesBet>>;

    async fn insert_series_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &SeriesPick,
    ) -> Result<i64>;

    async fn update_series_bet(&mut self, bet_id: i64, pick: &SeriesPick) -> Result<()>;

    async fn series_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<SeriesBet>>;

    async fn set_series_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()>;
}

/// Repository over special-bet events and their predictions
#[async_trait]
pub trait SpecialStore {
    async fn special_event(&mut self, event_id: i64) -> Result<Option<SpecialEvent>>;

    async fn find_special_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<SpecialBet>>;

    async fn insert_special_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &SpecialPick,
    ) -> Result<i64>;

    async fn update_special_bet(&mut self, bet_id: i64, pick: &SpecialPick) -> Result<()>;

    async fn special_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<SpecialBet>>;

    async fn set_special_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()>;
}

/// Repository over question events and their predictions
#[async_trait]
pub trait QuestionStore {
    async fn question_event(&mut self, event_id: i64) -> Result<Option<QuestionEvent>>;

    async fn find_question_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<QuestionBet>>;

    async fn insert_question_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &QuestionPick,
    ) -> Result<i64>;

    async fn update_question_bet(&mut self, bet_id: i64, pick: &QuestionPick) -> Result<()>;

    async fn question_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<QuestionBet>>;

    async fn set_question_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()>;
}

/// Reads shared by submission validation and evaluation: the active
/// rule set, temporal scorer rankings, and player facts
#[async_trait]
pub trait RuleStore {
    /// Active rules of a league for one entity kind, with configs
    /// parsed into their typed form (malformed configs error here)
    async fn rules_for(&mut self, league_id: i64, kind: EntityKind) -> Result<Vec<Rule>>;

    /// Rankings of the given players as of instant `at`
    async fn scorer_rankings_at(
        &mut self,
        player_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<RankingIndex>;

    /// Whether a player is on the roster of any of the given teams
    async fn player_in_teams(&mut self, player_id: i64, team_ids: &[i64]) -> Result<bool>;

    /// Position codes for the given players (missing players omitted)
    async fn player_positions(&mut self, player_ids: &[i64]) -> Result<HashMap<i64, String>>;
}

/// One open transaction over every repository.
///
/// Dropping a unit of work without committing rolls it back; nothing
/// the orchestrator or submission protocol does is visible until
/// `commit` returns.
#[async_trait]
pub trait UnitOfWork:
    MatchStore + SeriesStore + SpecialStore + QuestionStore + RuleStore + Send
{
    /// Flag an event as evaluated (full runs only)
    async fn mark_evaluated(&mut self, kind: EntityKind, event_id: i64) -> Result<()>;

    async fn commit(self) -> Result<()>
    where
        Self: Sized;

    async fn rollback(self) -> Result<()>
    where
        Self: Sized;
}

/// Opens units of work at the strictest isolation the backend offers
#[async_trait]
pub trait StoreFactory: Send + Sync {
    type Uow: UnitOfWork;

    async fn begin_serializable(&self) -> Result<Self::Uow>;
}
