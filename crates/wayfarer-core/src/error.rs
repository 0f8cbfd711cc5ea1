//! Engine-level error type.
//!
//! Every failure surfaced by a core service carries a stable error code so
//! outer layers (HTTP surface, CLI) can map it without string matching.
//! Query-layer `anyhow` errors fold into [`EngineError::Storage`].

use thiserror::Error;

/// Errors surfaced by the plan lifecycle services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input violates a contract: bad format, broken constraint, or an
    /// impossible request. Not retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A state transition or ownership check was rejected.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An idempotency key was reused with a materially different request.
    #[error("idempotency key already used: {0}")]
    IdempotencyConflict(String),

    /// A booking reached a terminal failure.
    #[error("booking failed: {0}")]
    BookingFailed(String),

    /// The provider adapter reported an error. `retryable` distinguishes
    /// transient failures (timeouts, 5xx) from terminal ones.
    #[error("provider error: {reason}")]
    Provider { reason: String, retryable: bool },

    /// The replan pipeline could not complete; no mutation was committed.
    #[error("replan failed: {0}")]
    ReplanFailed(String),

    /// The rollback window expired or the rollback was already consumed.
    #[error("rollback window expired or already consumed")]
    RollbackExpired,

    /// The transactional scope could not commit.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::IdempotencyConflict(_) => "IDEMPOTENCY_CONFLICT",
            Self::BookingFailed(_) => "BOOKING_FAILED",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::ReplanFailed(_) => "REPLAN_FAILED",
            Self::RollbackExpired => "ROLLBACK_EXPIRED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Shorthand for a transient (retryable) provider error.
    pub fn provider_transient(reason: impl Into<String>) -> Self {
        Self::Provider {
            reason: reason.into(),
            retryable: true,
        }
    }

    /// Shorthand for a terminal provider error.
    pub fn provider_terminal(reason: impl Into<String>) -> Self {
        Self::Provider {
            reason: reason.into(),
            retryable: false,
        }
    }
}

/// Convenience alias used across the core services.
pub type EngineResult<T> = Result<T, EngineError>;
