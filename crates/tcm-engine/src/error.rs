//! Engine errors.
//!
//! Business failures of the review lifecycle ([`LifecycleError`]) are kept
//! apart from infrastructure failures ([`StoreError`]) so callers can map
//! them to different responses.

use thiserror::Error;

use tcm_cases::LifecycleError;

/// A storage collaborator failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not finish within the configured deadline.
    #[error("store operation {operation} timed out after {after_ms} ms")]
    Timeout {
        /// Port method that timed out.
        operation: &'static str,
        /// Deadline in milliseconds.
        after_ms: u64,
    },

    /// A stored record could not be decoded.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

/// Publishing a case event failed. Always logged and swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The notification channel is unavailable.
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Top-level engine error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Infrastructure failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The review request was rejected.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A bulk-check task ended without producing a result.
    #[error("check task aborted: {0}")]
    Aborted(String),
}

impl EngineError {
    /// Whether the failure is infrastructure rather than a rejected request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Aborted(_))
    }
}
