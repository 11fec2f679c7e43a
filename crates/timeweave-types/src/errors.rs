use thiserror::Error;

use crate::TimelineId;

pub type Result<T, E = TimeweaveError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum TimeweaveError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("unknown timeline: {0}")]
    UnknownTimeline(TimelineId),
    #[error("transaction state error: {0}")]
    TransactionState(String),
    #[error("step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error("bus error: {0}")]
    Bus(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TimeweaveError {
    pub fn validation(message: impl Into<String>) -> Self {
        TimeweaveError::Validation(message.into())
    }

    /// Errors caused by bad input. These reject a request without mutating anything.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TimeweaveError::Validation(_)
                | TimeweaveError::OutOfRange { .. }
                | TimeweaveError::UnknownTimeline(_)
        )
    }
}
