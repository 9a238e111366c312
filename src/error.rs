use thiserror::Error;

/// Main error type for the league scoring core
#[derive(Error, Debug)]
pub enum TiplineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Lookup failures
    #[error("Not found: {0}")]
    NotFound(String),

    // Authorization failures
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Payload / business-rule violations
    #[error("Validation failed: {0}")]
    Validation(String),

    // Submission attempted at or after the event lock time
    #[error("Betting closed for event {event_id} at {lock_time}")]
    BettingClosed {
        event_id: i64,
        lock_time: chrono::DateTime<chrono::Utc>,
    },

    // Transaction could not commit due to concurrent modification; caller-retryable
    #[error("Conflict: {0}")]
    Conflict(String),

    // Evaluation attempted before an outcome was recorded, or with a malformed rule set
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TiplineError {
    /// Whether the caller may safely retry the whole operation.
    ///
    /// Only serialization conflicts qualify; everything else is either
    /// a definitive rejection or a fault the caller must surface.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TiplineError::Conflict(_))
    }
}

/// Result type alias for TiplineError
pub type Result<T> = std::result::Result<T, TiplineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        assert!(TiplineError::Conflict("serialization failure".into()).is_retryable());
        assert!(!TiplineError::NotFound("event 7".into()).is_retryable());
        assert!(!TiplineError::Validation("negative score".into()).is_retryable());
    }
}
