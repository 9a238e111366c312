use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One time-versioned row of a player's goal-scoring prominence.
///
/// Rows are append-only: a ranking change closes the current row
/// (sets `effective_to`) and opens a new one. Scoring always reads the
/// row active at the event's lock time, so later ranking changes never
/// rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerRanking {
    pub player_id: i64,
    pub rank: i16,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl ScorerRanking {
    /// Half-open validity: `effective_from <= t < effective_to`,
    /// open-ended when `effective_to` is null.
    pub fn active_at(&self, t: DateTime<Utc>) -> bool {
        self.effective_from <= t && self.effective_to.map_or(true, |end| t < end)
    }
}

/// Rankings pre-resolved to a single instant.
///
/// The evaluation orchestrator builds one of these per run so the
/// scoring functions never touch storage.
#[derive(Debug, Clone, Default)]
pub struct RankingIndex {
    ranks: HashMap<i64, i16>,
}

impl RankingIndex {
    pub fn new(ranks: HashMap<i64, i16>) -> Self {
        Self { ranks }
    }

    /// Build the index from raw ranking rows, keeping only rows active
    /// at `t`.
    pub fn at(rows: &[ScorerRanking], t: DateTime<Utc>) -> Self {
        let ranks = rows
            .iter()
            .filter(|row| row.active_at(t))
            .map(|row| (row.player_id, row.rank))
            .collect();
        Self { ranks }
    }

    pub fn rank_of(&self, player_id: i64) -> Option<i16> {
        self.ranks.get(&player_id).copied()
    }
}
