use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sport played in a league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Soccer,
    Hockey,
}

impl Sport {
    /// Whether a game in this sport can legally finish without a goal.
    ///
    /// Hockey resolves every game with at least one scorer, so a
    /// "no scorer" prediction is invalid there.
    pub fn allows_scoreless(&self) -> bool {
        match self {
            Sport::Soccer => true,
            Sport::Hockey => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Soccer => "soccer",
            Sport::Hockey => "hockey",
        }
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Sport {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "soccer" => Ok(Sport::Soccer),
            "hockey" => Ok(Sport::Hockey),
            other => Err(format!("unknown sport: {other}")),
        }
    }
}

/// A season-scoped competition owning members, events and the rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    pub sport: Sport,
    pub season_start: DateTime<Utc>,
}

/// Membership role within a league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeagueRole {
    Admin,
    Member,
}

impl LeagueRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeagueRole::Admin => "admin",
            LeagueRole::Member => "member",
        }
    }
}

impl TryFrom<&str> for LeagueRole {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "admin" => Ok(LeagueRole::Admin),
            "member" => Ok(LeagueRole::Member),
            other => Err(format!("unknown league role: {other}")),
        }
    }
}

/// A user's membership record within one league.
///
/// Every prediction is owned by a LeagueUser, not by the raw user, so
/// one person's history stays separate per league. Rows are
/// soft-deleted to preserve historical scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueUser {
    pub id: i64,
    pub user_id: i64,
    pub league_id: i64,
    pub role: LeagueRole,
    pub paid: bool,
    pub active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LeagueUser {
    /// An inactive or tombstoned membership may not submit predictions.
    pub fn is_active(&self) -> bool {
        self.active && self.deleted_at.is_none()
    }

    pub fn is_admin(&self) -> bool {
        self.role == LeagueRole::Admin
    }
}
