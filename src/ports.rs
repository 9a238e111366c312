//! Boundaries to external collaborators.
//!
//! Audit transport, cache invalidation and membership resolution live
//! outside this core; these traits pin down the contract each one must
//! honor. Audit and invalidation are best-effort side channels: call
//! sites log their failures and move on, they never fail the primary
//! operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{EntityKind, LeagueUser};
use crate::error::Result;
use crate::store::PostgresStore;

// ============================================================================
// Audit
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    BetCreated,
    BetUpdated,
    EventEvaluated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::BetCreated => "bet_created",
            AuditAction::BetUpdated => "bet_updated",
            AuditAction::EventEvaluated => "event_evaluated",
        }
    }
}

/// One audit record emitted after a successful core operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: i64,
    pub league_id: Option<i64>,
    pub entity_id: i64,
    pub action: AuditAction,
    pub metadata: serde_json::Value,
    pub duration_ms: u64,
}

impl AuditEntry {
    pub fn new(
        actor_id: i64,
        league_id: Option<i64>,
        entity_id: i64,
        action: AuditAction,
        metadata: serde_json::Value,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            league_id,
            entity_id,
            action,
            metadata,
            duration_ms,
        }
    }
}

/// Receiver of audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Audit sink that writes structured log lines; the default when no
/// external collector is wired up
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        info!(
            audit_id = %entry.id,
            actor_id = entry.actor_id,
            league_id = entry.league_id,
            entity_id = entry.entity_id,
            action = entry.action.as_str(),
            duration_ms = entry.duration_ms,
            metadata = %entry.metadata,
            "audit"
        );
        Ok(())
    }
}

/// Emit an audit entry without letting a sink failure surface.
pub async fn emit_audit(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action;
    if let Err(e) = sink.record(entry).await {
        warn!("Audit emission for {} failed: {}", action.as_str(), e);
    }
}

// ============================================================================
// View invalidation
// ============================================================================

/// Typed invalidation event: "this league's view of this entity kind
/// is now stale"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChanged {
    pub league_id: i64,
    pub kind: EntityKind,
}

/// Receiver of invalidation events, signaled exactly once per
/// successful mutating operation
#[async_trait]
pub trait ViewInvalidator: Send + Sync {
    async fn entity_changed(&self, change: EntityChanged) -> Result<()>;
}

/// Invalidator for deployments without a cache layer
pub struct NoopInvalidator;

#[async_trait]
impl ViewInvalidator for NoopInvalidator {
    async fn entity_changed(&self, _change: EntityChanged) -> Result<()> {
        Ok(())
    }
}

/// Signal an invalidation without letting a delivery failure surface.
pub async fn emit_invalidation(invalidator: &dyn ViewInvalidator, change: EntityChanged) {
    if let Err(e) = invalidator.entity_changed(change).await {
        warn!(
            "View invalidation for league {} {} failed: {}",
            change.league_id, change.kind, e
        );
    }
}

// ============================================================================
// Membership
// ============================================================================

/// Resolves a caller to their membership row within a league.
///
/// The core treats this as an opaque precondition check and never
/// inlines authentication logic.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    async fn resolve(&self, user_id: i64, league_id: i64) -> Result<Option<LeagueUser>>;
}

#[async_trait]
impl MembershipResolver for PostgresStore {
    async fn resolve(&self, user_id: i64, league_id: i64) -> Result<Option<LeagueUser>> {
        self.league_user(user_id, league_id).await
    }
}
