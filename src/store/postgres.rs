use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, info, instrument};

use crate::config::TransactionConfig;
use crate::domain::{
    EntityKind, LeagueRole, LeagueUser, MatchBet, MatchEvent, MatchOutcome, MatchPick,
    QuestionBet, QuestionEvent, QuestionPick, RankingIndex, ScorerRanking, SeriesBet, SeriesEvent,
    SeriesOutcome, SeriesPick, SpecialBet, SpecialBetKind, SpecialEvent, SpecialOutcome,
    SpecialPick, Sport,
};
use crate::error::{Result, TiplineError};
use crate::scoring::{Rule, RuleKind};

use super::{
    MatchStore, QuestionStore, RuleStore, SeriesStore, SpecialStore, StoreFactory, UnitOfWork,
};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    tx_config: TransactionConfig,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        tx_config: TransactionConfig,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool, tx_config })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            tx_config: TransactionConfig::default(),
        }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ==================== Membership ====================

    /// Resolve a user's membership row within a league
    pub async fn league_user(
        &self,
        user_id: i64,
        league_id: i64,
    ) -> Result<Option<LeagueUser>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, league_id, role, paid, active, deleted_at
            FROM league_users
            WHERE user_id = $1 AND league_id = $2
            "#,
        )
        .bind(user_id)
        .bind(league_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| map_league_user(&r)).transpose()
    }

    // ==================== Outcome recording ====================
    //
    // The administrative write path. Every statement clears the
    // evaluated flag in the same write, so a corrected outcome always
    // reopens the event for re-evaluation.

    #[instrument(skip(self, outcome))]
    pub async fn record_match_outcome(
        &self,
        event_id: i64,
        outcome: &MatchOutcome,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE match_events SET
                home_score = $2,
                away_score = $3,
                overtime = $4,
                shootout = $5,
                scorers = $6,
                is_evaluated = FALSE
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(outcome.home_score)
        .bind(outcome.away_score)
        .bind(outcome.overtime)
        .bind(outcome.shootout)
        .bind(&outcome.scorers)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(TiplineError::NotFound(format!("match event {event_id}")));
        }
        debug!("Recorded outcome for match event {}", event_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn record_series_outcome(
        &self,
        event_id: i64,
        outcome: SeriesOutcome,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE series_events SET
                home_wins = $2,
                away_wins = $3,
                is_evaluated = FALSE
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(outcome.home_wins)
        .bind(outcome.away_wins)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(TiplineError::NotFound(format!("series event {event_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, outcome))]
    pub async fn record_special_outcome(
        &self,
        event_id: i64,
        outcome: &SpecialOutcome,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE special_events SET
                result_team_id = $2,
                advanced_team_ids = $3,
                result_player_id = $4,
                result_value = $5,
                outcome_recorded_at = NOW(),
                is_evaluated = FALSE
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(outcome.team_id)
        .bind(&outcome.advanced_team_ids)
        .bind(outcome.player_id)
        .bind(outcome.value)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(TiplineError::NotFound(format!("special event {event_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn record_question_outcome(&self, event_id: i64, outcome: bool) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE question_events SET
                outcome = $2,
                is_evaluated = FALSE
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(outcome)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(TiplineError::NotFound(format!("question event {event_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreFactory for PostgresStore {
    type Uow = PgUnitOfWork;

    /// Open a SERIALIZABLE transaction with bounded lock and statement
    /// timeouts. Timeout values come from validated config, so inlining
    /// them into SET LOCAL (which cannot take bind parameters) is safe.
    async fn begin_serializable(&self) -> Result<PgUnitOfWork> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = {}",
            self.tx_config.lock_timeout_ms
        ))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.tx_config.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        debug!("Started serializable unit of work");
        Ok(PgUnitOfWork { tx })
    }
}

/// One open PostgreSQL transaction; dropped without commit it rolls
/// back automatically
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn mark_evaluated(&mut self, kind: EntityKind, event_id: i64) -> Result<()> {
        let table = match kind {
            EntityKind::Match => "match_events",
            EntityKind::Series => "series_events",
            EntityKind::Special => "special_events",
            EntityKind::Question => "question_events",
        };
        sqlx::query(&format!(
            "UPDATE {table} SET is_evaluated = TRUE WHERE id = $1"
        ))
        .bind(event_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(db_err)?;
        debug!("Committed unit of work");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(db_err)?;
        debug!("Rolled back unit of work");
        Ok(())
    }
}

// ==================== Match events & bets ====================

#[async_trait]
impl MatchStore for PgUnitOfWork {
    async fn match_event(&mut self, event_id: i64) -> Result<Option<MatchEvent>> {
        let row = sqlx::query(
            r#"
            SELECT e.id, e.league_id, l.sport, e.home_team_id, e.away_team_id,
                   e.lock_time, e.doubled, e.home_score, e.away_score,
                   e.overtime, e.shootout, e.scorers, e.is_evaluated, e.deleted_at
            FROM match_events e
            JOIN leagues l ON l.id = e.league_id
            WHERE e.id = $1 AND e.deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(|r| map_match_event(&r)).transpose()
    }

    async fn find_match_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<MatchBet>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, home_score, away_score, scorer, no_scorer,
                   total_points, created_at, updated_at, deleted_at
            FROM match_bets
            WHERE league_user_id = $1 AND event_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| map_match_bet(&r)))
    }

    async fn insert_match_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &MatchPick,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO match_bets
                (league_user_id, event_id, home_score, away_score, scorer, no_scorer,
                 total_points, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .bind(pick.home_score)
        .bind(pick.away_score)
        .bind(pick.scorer)
        .bind(pick.no_scorer)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.get("id"))
    }

    async fn update_match_bet(&mut self, bet_id: i64, pick: &MatchPick) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE match_bets SET
                home_score = $2,
                away_score = $3,
                scorer = $4,
                no_scorer = $5,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(bet_id)
        .bind(pick.home_score)
        .bind(pick.away_score)
        .bind(pick.scorer)
        .bind(pick.no_scorer)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn match_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<MatchBet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, home_score, away_score, scorer, no_scorer,
                   total_points, created_at, updated_at, deleted_at
            FROM match_bets
            WHERE event_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR league_user_id = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(event_id)
        .bind(league_user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows.iter().map(map_match_bet).collect())
    }

    async fn set_match_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        sqlx::query("UPDATE match_bets SET total_points = $2 WHERE id = $1")
            .bind(bet_id)
            .bind(points)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ==================== Series events & bets ====================

#[async_trait]
impl SeriesStore for PgUnitOfWork {
    async fn series_event(&mut self, event_id: i64) -> Result<Option<SeriesEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_id, home_team_id, away_team_id, best_of, lock_time,
                   home_wins, away_wins, is_evaluated, deleted_at
            FROM series_events
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| map_series_event(&r)))
    }

    async fn find_series_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<SeriesBet>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, home_wins, away_wins,
                   total_points, created_at, updated_at, deleted_at
            FROM series_bets
            WHERE league_user_id = $1 AND event_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| map_series_bet(&r)))
    }

    async fn insert_series_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &SeriesPick,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO series_bets
                (league_user_id, event_id, home_wins, away_wins, total_points,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .bind(pick.home_wins)
        .bind(pick.away_wins)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.get("id"))
    }

    async fn update_series_bet(&mut self, bet_id: i64, pick: &SeriesPick) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE series_bets SET
                home_wins = $2,
                away_wins = $3,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(bet_id)
        .bind(pick.home_wins)
        .bind(pick.away_wins)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn series_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<SeriesBet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, home_wins, away_wins,
                   total_points, created_at, updated_at, deleted_at
            FROM series_bets
            WHERE event_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR league_user_id = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(event_id)
        .bind(league_user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows.iter().map(map_series_bet).collect())
    }

    async fn set_series_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        sqlx::query("UPDATE series_bets SET total_points = $2 WHERE id = $1")
            .bind(bet_id)
            .bind(points)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ==================== Special events & bets ====================

#[async_trait]
impl SpecialStore for PgUnitOfWork {
    async fn special_event(&mut self, event_id: i64) -> Result<Option<SpecialEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_id, bet_kind, lock_time, result_team_id, advanced_team_ids,
                   result_player_id, result_value, outcome_recorded_at, is_evaluated, deleted_at
            FROM special_events
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(|r| map_special_event(&r)).transpose()
    }

    async fn find_special_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<SpecialBet>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, team_id, player_id, value,
                   total_points, created_at, updated_at, deleted_at
            FROM special_bets
            WHERE league_user_id = $1 AND event_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| map_special_bet(&r)))
    }

    async fn insert_special_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &SpecialPick,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO special_bets
                (league_user_id, event_id, team_id, player_id, value, total_points,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .bind(pick.team_id)
        .bind(pick.player_id)
        .bind(pick.value)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.get("id"))
    }

    async fn update_special_bet(&mut self, bet_id: i64, pick: &SpecialPick) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE special_bets SET
                team_id = $2,
                player_id = $3,
                value = $4,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(bet_id)
        .bind(pick.team_id)
        .bind(pick.player_id)
        .bind(pick.value)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn special_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<SpecialBet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, team_id, player_id, value,
                   total_points, created_at, updated_at, deleted_at
            FROM special_bets
            WHERE event_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR league_user_id = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(event_id)
        .bind(league_user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows.iter().map(map_special_bet).collect())
    }

    async fn set_special_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        sqlx::query("UPDATE special_bets SET total_points = $2 WHERE id = $1")
            .bind(bet_id)
            .bind(points)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ==================== Question events & bets ====================

#[async_trait]
impl QuestionStore for PgUnitOfWork {
    async fn question_event(&mut self, event_id: i64) -> Result<Option<QuestionEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_id, text, lock_time, outcome, is_evaluated, deleted_at
            FROM question_events
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| map_question_event(&r)))
    }

    async fn find_question_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<QuestionBet>> {
        let row = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, answer,
                   total_points, created_at, updated_at, deleted_at
            FROM question_bets
            WHERE league_user_id = $1 AND event_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| map_question_bet(&r)))
    }

    async fn insert_question_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &QuestionPick,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO question_bets
                (league_user_id, event_id, answer, total_points, created_at, updated_at)
            VALUES ($1, $2, $3, 0, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(league_user_id)
        .bind(event_id)
        .bind(pick.answer)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.get("id"))
    }

    async fn update_question_bet(&mut self, bet_id: i64, pick: &QuestionPick) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE question_bets SET
                answer = $2,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(bet_id)
        .bind(pick.answer)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn question_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<QuestionBet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, league_user_id, event_id, answer,
                   total_points, created_at, updated_at, deleted_at
            FROM question_bets
            WHERE event_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR league_user_id = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(event_id)
        .bind(league_user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows.iter().map(map_question_bet).collect())
    }

    async fn set_question_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        sqlx::query("UPDATE question_bets SET total_points = $2 WHERE id = $1")
            .bind(bet_id)
            .bind(points)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ==================== Rules, rankings, players ====================

#[async_trait]
impl RuleStore for PgUnitOfWork {
    async fn rules_for(&mut self, league_id: i64, kind: EntityKind) -> Result<Vec<Rule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, points, kind, config
            FROM rules
            WHERE league_id = $1 AND entity_kind = $2 AND active
            ORDER BY id ASC
            "#,
        )
        .bind(league_id)
        .bind(kind.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("kind");
                let config: Option<serde_json::Value> = row.get("config");
                Ok(Rule {
                    id: row.get("id"),
                    name: row.get("name"),
                    points: row.get("points"),
                    kind: RuleKind::from_parts(&kind_str, config.as_ref())?,
                })
            })
            .collect()
    }

    async fn scorer_rankings_at(
        &mut self,
        player_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<RankingIndex> {
        if player_ids.is_empty() {
            return Ok(RankingIndex::default());
        }

        let rows = sqlx::query(
            r#"
            SELECT player_id, rank, effective_from, effective_to
            FROM scorer_rankings
            WHERE player_id = ANY($1)
              AND effective_from <= $2
              AND (effective_to IS NULL OR effective_to > $2)
            "#,
        )
        .bind(player_ids)
        .bind(at)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        let rankings: Vec<ScorerRanking> = rows
            .iter()
            .map(|row| ScorerRanking {
                player_id: row.get("player_id"),
                rank: row.get("rank"),
                effective_from: row.get("effective_from"),
                effective_to: row.get("effective_to"),
            })
            .collect();

        Ok(RankingIndex::at(&rankings, at))
    }

    async fn player_in_teams(&mut self, player_id: i64, team_ids: &[i64]) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM players WHERE id = $1 AND team_id = ANY($2)
            ) AS on_roster
            "#,
        )
        .bind(player_id)
        .bind(team_ids)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.get("on_roster"))
    }

    async fn player_positions(&mut self, player_ids: &[i64]) -> Result<HashMap<i64, String>> {
        if player_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, position FROM players WHERE id = ANY($1)
            "#,
        )
        .bind(player_ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<i64, _>("id"), row.get::<String, _>("position")))
            .collect())
    }
}

// ==================== Row mapping ====================

fn map_league_user(row: &PgRow) -> Result<LeagueUser> {
    let role: String = row.get("role");
    Ok(LeagueUser {
        id: row.get("id"),
        user_id: row.get("user_id"),
        league_id: row.get("league_id"),
        role: LeagueRole::try_from(role.as_str()).map_err(TiplineError::Internal)?,
        paid: row.get("paid"),
        active: row.get("active"),
        deleted_at: row.get("deleted_at"),
    })
}

fn map_match_event(row: &PgRow) -> Result<MatchEvent> {
    let sport: String = row.get("sport");
    let home_score: Option<i16> = row.get("home_score");
    let away_score: Option<i16> = row.get("away_score");

    // The outcome exists only once both scores are recorded.
    let outcome = match (home_score, away_score) {
        (Some(home), Some(away)) => Some(MatchOutcome {
            home_score: home,
            away_score: away,
            overtime: row.get("overtime"),
            shootout: row.get("shootout"),
            scorers: row
                .get::<Option<Vec<i64>>, _>("scorers")
                .unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(MatchEvent {
        id: row.get("id"),
        league_id: row.get("league_id"),
        sport: Sport::try_from(sport.as_str()).map_err(TiplineError::Internal)?,
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        lock_time: row.get("lock_time"),
        doubled: row.get("doubled"),
        outcome,
        is_evaluated: row.get("is_evaluated"),
        deleted_at: row.get("deleted_at"),
    })
}

fn map_series_event(row: &PgRow) -> SeriesEvent {
    let home_wins: Option<i16> = row.get("home_wins");
    let away_wins: Option<i16> = row.get("away_wins");
    let outcome = match (home_wins, away_wins) {
        (Some(home), Some(away)) => Some(SeriesOutcome {
            home_wins: home,
            away_wins: away,
        }),
        _ => None,
    };

    SeriesEvent {
        id: row.get("id"),
        league_id: row.get("league_id"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        best_of: row.get("best_of"),
        lock_time: row.get("lock_time"),
        outcome,
        is_evaluated: row.get("is_evaluated"),
        deleted_at: row.get("deleted_at"),
    }
}

fn map_special_event(row: &PgRow) -> Result<SpecialEvent> {
    let bet_kind: String = row.get("bet_kind");
    let recorded_at: Option<DateTime<Utc>> = row.get("outcome_recorded_at");

    let outcome = recorded_at.map(|_| SpecialOutcome {
        team_id: row.get("result_team_id"),
        advanced_team_ids: row
            .get::<Option<Vec<i64>>, _>("advanced_team_ids")
            .unwrap_or_default(),
        player_id: row.get("result_player_id"),
        value: row.get("result_value"),
    });

    Ok(SpecialEvent {
        id: row.get("id"),
        league_id: row.get("league_id"),
        bet_kind: SpecialBetKind::try_from(bet_kind.as_str()).map_err(TiplineError::Internal)?,
        lock_time: row.get("lock_time"),
        outcome,
        is_evaluated: row.get("is_evaluated"),
        deleted_at: row.get("deleted_at"),
    })
}

fn map_question_event(row: &PgRow) -> QuestionEvent {
    QuestionEvent {
        id: row.get("id"),
        league_id: row.get("league_id"),
        text: row.get("text"),
        lock_time: row.get("lock_time"),
        outcome: row.get("outcome"),
        is_evaluated: row.get("is_evaluated"),
        deleted_at: row.get("deleted_at"),
    }
}

fn map_match_bet(row: &PgRow) -> MatchBet {
    MatchBet {
        id: row.get("id"),
        league_user_id: row.get("league_user_id"),
        event_id: row.get("event_id"),
        pick: MatchPick {
            home_score: row.get("home_score"),
            away_score: row.get("away_score"),
            scorer: row.get("scorer"),
            no_scorer: row.get("no_scorer"),
        },
        total_points: row.get("total_points"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn map_series_bet(row: &PgRow) -> SeriesBet {
    SeriesBet {
        id: row.get("id"),
        league_user_id: row.get("league_user_id"),
        event_id: row.get("event_id"),
        pick: SeriesPick {
            home_wins: row.get("home_wins"),
            away_wins: row.get("away_wins"),
        },
        total_points: row.get("total_points"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn map_special_bet(row: &PgRow) -> SpecialBet {
    SpecialBet {
        id: row.get("id"),
        league_user_id: row.get("league_user_id"),
        event_id: row.get("event_id"),
        pick: SpecialPick {
            team_id: row.get("team_id"),
            player_id: row.get("player_id"),
            value: row.get("value"),
        },
        total_points: row.get("total_points"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn map_question_bet(row: &PgRow) -> QuestionBet {
    QuestionBet {
        id: row.get("id"),
        league_user_id: row.get("league_user_id"),
        event_id: row.get("event_id"),
        pick: QuestionPick {
            answer: row.get("answer"),
        },
        total_points: row.get("total_points"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

/// Translate low-level database failures into the core taxonomy.
///
/// Serialization failures and deadlocks are retryable conflicts; a
/// unique violation on the (member, event) key means a concurrent
/// submission won the race, which is the same caller-visible conflict.
fn db_err(e: sqlx::Error) -> TiplineError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            match code.as_ref() {
                "40001" | "40P01" => return TiplineError::Conflict(db.message().to_string()),
                "23505" => {
                    return TiplineError::Conflict(format!(
                        "concurrent submission: {}",
                        db.message()
                    ))
                }
                _ => {}
            }
        }
    }
    TiplineError::Database(e)
}
