//! Lifecycle errors.

use thiserror::Error;

use tcm_core::{AnalystId, CaseId};

use crate::status::CaseStatus;

/// A review request the lifecycle rejects. Nothing is changed when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No case with this id.
    #[error("case {0} not found")]
    NotFound(CaseId),

    /// The analyst directory does not know this analyst.
    #[error("analyst {0} not found")]
    AnalystNotFound(AnalystId),

    /// Leaving `New` needs an analyst, already assigned or supplied.
    #[error("an analyst must be assigned before the case can leave New")]
    MissingAnalyst,

    /// Resolving needs a decision.
    #[error("a decision is required to resolve the case")]
    MissingDecision,

    /// The requested change is not allowed from the current status.
    #[error("invalid case transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current status.
        from: CaseStatus,
        /// Requested status.
        to: CaseStatus,
        /// Why it was rejected.
        reason: String,
    },

    /// Another reviewer changed the case between read and write, and the
    /// request could not be re-applied to the newer state.
    #[error("case {0} was changed concurrently, reload and retry")]
    Conflict(CaseId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = LifecycleError::InvalidTransition {
            from: CaseStatus::UnderReview,
            to: CaseStatus::New,
            reason: "a case cannot return to New".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid case transition from UnderReview to New: a case cannot return to New"
        );
    }

    #[test]
    fn conflict_names_the_case() {
        let id = CaseId::new();
        assert!(LifecycleError::Conflict(id).to_string().contains(&id.to_string()));
    }

    #[test]
    fn missing_analyst_display() {
        assert!(LifecycleError::MissingAnalyst.to_string().contains("analyst"));
    }
}
