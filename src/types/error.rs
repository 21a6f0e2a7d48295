//! Error types for the engagement core

/// Main error type for engagement operations
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    /// Unknown user, quest, campaign or submission. No mutation happened;
    /// safe to retry with corrected input.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Submission or completion record is not in an actionable state.
    /// No mutation happened; the caller must resync before retrying.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The (user, task) pair is already satisfied. Idempotent no-op —
    /// callers treat this as success, not as a client error.
    #[error("Already completed: {0}")]
    AlreadyCompleted(String),

    /// Timer on a delay-gated quest has not elapsed. Safe to retry later.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Completion was recorded but the chain executor could not be reached.
    /// Retried by the reconciliation sweep, never by re-running completion.
    #[error("Claim gateway unavailable: {0}")]
    ClaimGatewayUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngagementError {
    /// Whether the caller should surface this as a successful no-op.
    ///
    /// Duplicate completion attempts must appear successful to avoid
    /// confusing retries from flaky clients.
    pub fn is_idempotent_noop(&self) -> bool {
        matches!(self, Self::AlreadyCompleted(_))
    }

    /// Whether the operation left no state behind and may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotReady(_) | Self::Database(_) | Self::ClaimGatewayUnavailable(_)
        )
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for EngagementError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for EngagementError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for EngagementError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<async_nats::Error> for EngagementError {
    fn from(err: async_nats::Error) -> Self {
        Self::Gateway(err.to_string())
    }
}

/// Result type alias for engagement operations
pub type Result<T> = std::result::Result<T, EngagementError>;
