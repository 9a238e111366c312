//! In-memory store fake for driving the submission protocol and the
//! evaluation orchestrator without a database.
//!
//! A unit of work clones the shared state, operates on the clone and
//! writes it back on commit, so a dropped (failed) unit of work leaves
//! no partial writes behind.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tipline::domain::{
    EntityKind, LeagueUser, MatchBet, MatchEvent, MatchPick, QuestionBet, QuestionEvent,
    QuestionPick, RankingIndex, ScorerRanking, SeriesBet, SeriesEvent, SeriesPick, SpecialBet,
    SpecialEvent, SpecialPick,
};
use tipline::error::Result;
use tipline::ports::MembershipResolver;
use tipline::scoring::Rule;
use tipline::store::{
    MatchStore, QuestionStore, RuleStore, SeriesStore, SpecialStore, StoreFactory, UnitOfWork,
};

#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub team_id: i64,
    pub position: String,
}

#[derive(Default, Clone)]
pub struct MemoryState {
    pub match_events: HashMap<i64, MatchEvent>,
    pub series_events: HashMap<i64, SeriesEvent>,
    pub special_events: HashMap<i64, SpecialEvent>,
    pub question_events: HashMap<i64, QuestionEvent>,
    pub match_bets: HashMap<i64, MatchBet>,
    pub series_bets: HashMap<i64, SeriesBet>,
    pub special_bets: HashMap<i64, SpecialBet>,
    pub question_bets: HashMap<i64, QuestionBet>,
    pub rules: HashMap<(i64, EntityKind), Vec<Rule>>,
    pub rankings: Vec<ScorerRanking>,
    pub players: HashMap<i64, PlayerRecord>,
    pub next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Inspect committed state.
    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    /// Mutate committed state directly, standing in for administrative
    /// writes (outcome recording, corrections) that live outside the
    /// core.
    pub fn mutate<F: FnOnce(&mut MemoryState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }
}

#[async_trait]
impl StoreFactory for MemoryStore {
    type Uow = MemoryUow;

    async fn begin_serializable(&self) -> Result<MemoryUow> {
        let work = self.state.lock().unwrap().clone();
        Ok(MemoryUow {
            shared: Arc::clone(&self.state),
            work,
        })
    }
}

pub struct MemoryUow {
    shared: Arc<Mutex<MemoryState>>,
    work: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUow {
    async fn mark_evaluated(&mut self, kind: EntityKind, event_id: i64) -> Result<()> {
        match kind {
            EntityKind::Match => {
                if let Some(event) = self.work.match_events.get_mut(&event_id) {
                    event.is_evaluated = true;
                }
            }
            EntityKind::Series => {
                if let Some(event) = self.work.series_events.get_mut(&event_id) {
                    event.is_evaluated = true;
                }
            }
            EntityKind::Special => {
                if let Some(event) = self.work.special_events.get_mut(&event_id) {
                    event.is_evaluated = true;
                }
            }
            EntityKind::Question => {
                if let Some(event) = self.work.question_events.get_mut(&event_id) {
                    event.is_evaluated = true;
                }
            }
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        *self.shared.lock().unwrap() = self.work;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryUow {
    async fn match_event(&mut self, event_id: i64) -> Result<Option<MatchEvent>> {
        Ok(self
            .work
            .match_events
            .get(&event_id)
            .filter(|event| event.deleted_at.is_none())
            .cloned())
    }

    async fn find_match_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<MatchBet>> {
        Ok(self
            .work
            .match_bets
            .values()
            .find(|bet| {
                bet.league_user_id == league_user_id
                    && bet.event_id == event_id
                    && bet.deleted_at.is_none()
            })
            .cloned())
    }

    async fn insert_match_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &MatchPick,
    ) -> Result<i64> {
        let id = self.work.next_id();
        let now = Utc::now();
        self.work.match_bets.insert(
            id,
            MatchBet {
                id,
                league_user_id,
                event_id,
                pick: pick.clone(),
                total_points: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
        Ok(id)
    }

    async fn update_match_bet(&mut self, bet_id: i64, pick: &MatchPick) -> Result<()> {
        if let Some(bet) = self.work.match_bets.get_mut(&bet_id) {
            bet.pick = pick.clone();
            bet.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn match_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<MatchBet>> {
        let mut bets: Vec<MatchBet> = self
            .work
            .match_bets
            .values()
            .filter(|bet| {
                bet.event_id == event_id
                    && bet.deleted_at.is_none()
                    && league_user_id.map_or(true, |id| bet.league_user_id == id)
            })
            .cloned()
            .collect();
        bets.sort_by_key(|bet| bet.id);
        Ok(bets)
    }

    async fn set_match_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        if let Some(bet) = self.work.match_bets.get_mut(&bet_id) {
            bet.total_points = points;
        }
        Ok(())
    }
}

#[async_trait]
impl SeriesStore for MemoryUow {
    async fn series_event(&mut self, event_id: i64) -> Result<Option<SeriesEvent>> {
        Ok(self
            .work
            .series_events
            .get(&event_id)
            .filter(|event| event.deleted_at.is_none())
            .cloned())
    }

    async fn find_series_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<SeriesBet>> {
        Ok(self
            .work
            .series_bets
            .values()
            .find(|bet| {
                bet.league_user_id == league_user_id
                    && bet.event_id == event_id
                    && bet.deleted_at.is_none()
            })
            .cloned())
    }

    async fn insert_series_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &SeriesPick,
    ) -> Result<i64> {
        let id = self.work.next_id();
        let now = Utc::now();
        self.work.series_bets.insert(
            id,
            SeriesBet {
                id,
                league_user_id,
                event_id,
                pick: *pick,
                total_points: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
        Ok(id)
    }

    async fn update_series_bet(&mut self, bet_id: i64, pick: &SeriesPick) -> Result<()> {
        if let Some(bet) = self.work.series_bets.get_mut(&bet_id) {
            bet.pick = *pick;
            bet.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn series_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<SeriesBet>> {
        let mut bets: Vec<SeriesBet> = self
            .work
            .series_bets
            .values()
            .filter(|bet| {
                bet.event_id == event_id
                    && bet.deleted_at.is_none()
                    && league_user_id.map_or(true, |id| bet.league_user_id == id)
            })
            .cloned()
            .collect();
        bets.sort_by_key(|bet| bet.id);
        Ok(bets)
    }

    async fn set_series_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        if let Some(bet) = self.work.series_bets.get_mut(&bet_id) {
            bet.total_points = points;
        }
        Ok(())
    }
}

#[async_trait]
impl SpecialStore for MemoryUow {
    async fn special_event(&mut self, event_id: i64) -> Result<Option<SpecialEvent>> {
        Ok(self
            .work
            .special_events
            .get(&event_id)
            .filter(|event| event.deleted_at.is_none())
            .cloned())
    }

    async fn find_special_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<SpecialBet>> {
        Ok(self
            .work
            .special_bets
            .values()
            .find(|bet| {
                bet.league_user_id == league_user_id
                    && bet.event_id == event_id
                    && bet.deleted_at.is_none()
            })
            .cloned())
    }

    async fn insert_special_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &SpecialPick,
    ) -> Result<i64> {
        let id = self.work.next_id();
        let now = Utc::now();
        self.work.special_bets.insert(
            id,
            SpecialBet {
                id,
                league_user_id,
                event_id,
                pick: pick.clone(),
                total_points: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
        Ok(id)
    }

    async fn update_special_bet(&mut self, bet_id: i64, pick: &SpecialPick) -> Result<()> {
        if let Some(bet) = self.work.special_bets.get_mut(&bet_id) {
            bet.pick = pick.clone();
            bet.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn special_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<SpecialBet>> {
        let mut bets: Vec<SpecialBet> = self
            .work
            .special_bets
            .values()
            .filter(|bet| {
                bet.event_id == event_id
                    && bet.deleted_at.is_none()
                    && league_user_id.map_or(true, |id| bet.league_user_id == id)
            })
            .cloned()
            .collect();
        bets.sort_by_key(|bet| bet.id);
        Ok(bets)
    }

    async fn set_special_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        if let Some(bet) = self.work.special_bets.get_mut(&bet_id) {
            bet.total_points = points;
        }
        Ok(())
    }
}

#[async_trait]
impl QuestionStore for MemoryUow {
    async fn question_event(&mut self, event_id: i64) -> Result<Option<QuestionEvent>> {
        Ok(self
            .work
            .question_events
            .get(&event_id)
            .filter(|event| event.deleted_at.is_none())
            .cloned())
    }

    async fn find_question_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
    ) -> Result<Option<QuestionBet>> {
        Ok(self
            .work
            .question_bets
            .values()
            .find(|bet| {
                bet.league_user_id == league_user_id
                    && bet.event_id == event_id
                    && bet.deleted_at.is_none()
            })
            .cloned())
    }

    async fn insert_question_bet(
        &mut self,
        league_user_id: i64,
        event_id: i64,
        pick: &QuestionPick,
    ) -> Result<i64> {
        let id = self.work.next_id();
        let now = Utc::now();
        self.work.question_bets.insert(
            id,
            QuestionBet {
                id,
                league_user_id,
                event_id,
                pick: *pick,
                total_points: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
        Ok(id)
    }

    async fn update_question_bet(&mut self, bet_id: i64, pick: &QuestionPick) -> Result<()> {
        if let Some(bet) = self.work.question_bets.get_mut(&bet_id) {
            bet.pick = *pick;
            bet.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn question_bets_for_event(
        &mut self,
        event_id: i64,
        league_user_id: Option<i64>,
    ) -> Result<Vec<QuestionBet>> {
        let mut bets: Vec<QuestionBet> = self
            .work
            .question_bets
            .values()
            .filter(|bet| {
                bet.event_id == event_id
                    && bet.deleted_at.is_none()
                    && league_user_id.map_or(true, |id| bet.league_user_id == id)
            })
            .cloned()
            .collect();
        bets.sort_by_key(|bet| bet.id);
        Ok(bets)
    }

    async fn set_question_bet_points(&mut self, bet_id: i64, points: i32) -> Result<()> {
        if let Some(bet) = self.work.question_bets.get_mut(&bet_id) {
            bet.total_points = points;
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemoryUow {
    async fn rules_for(&mut self, league_id: i64, kind: EntityKind) -> Result<Vec<Rule>> {
        Ok(self
            .work
            .rules
            .get(&(league_id, kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn scorer_rankings_at(
        &mut self,
        player_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<RankingIndex> {
        let rows: Vec<ScorerRanking> = self
            .work
            .rankings
            .iter()
            .filter(|row| player_ids.contains(&row.player_id))
            .cloned()
            .collect();
        Ok(RankingIndex::at(&rows, at))
    }

    async fn player_in_teams(&mut self, player_id: i64, team_ids: &[i64]) -> Result<bool> {
        Ok(self
            .work
            .players
            .get(&player_id)
            .map_or(false, |player| team_ids.contains(&player.team_id)))
    }

    async fn player_positions(&mut self, player_ids: &[i64]) -> Result<HashMap<i64, String>> {
        Ok(player_ids
            .iter()
            .filter_map(|id| {
                self.work
                    .players
                    .get(id)
                    .map(|player| (*id, player.position.clone()))
            })
            .collect())
    }
}

/// Membership resolver backed by a fixed member list.
pub struct MemoryMembership {
    pub members: Vec<LeagueUser>,
}

#[async_trait]
impl MembershipResolver for MemoryMembership {
    async fn resolve(&self, user_id: i64, league_id: i64) -> Result<Option<LeagueUser>> {
        Ok(self
            .members
            .iter()
            .find(|member| member.user_id == user_id && member.league_id == league_id)
            .cloned())
    }
}
