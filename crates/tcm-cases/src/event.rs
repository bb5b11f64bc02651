//! Case events published to the notification collaborator.

use serde::{Deserialize, Serialize};

use tcm_core::{AnalystId, Severity};

use crate::status::{CaseDecision, CaseStatus};

/// Something that happened to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaseEventKind {
    /// The case was created.
    Opened {
        /// Severity at creation.
        severity: Severity,
    },
    /// New findings were attached to an existing case.
    FindingsAdded {
        /// Findings inserted.
        count: usize,
        /// Case severity afterwards.
        severity: Severity,
    },
    /// An analyst was assigned or reassigned.
    Assigned {
        /// The analyst now responsible.
        analyst_id: AnalystId,
    },
    /// The status changed.
    StatusChanged {
        /// Previous status.
        from: CaseStatus,
        /// New status.
        to: CaseStatus,
        /// Decision, when resolving.
        decision: Option<CaseDecision>,
    },
}

impl CaseEventKind {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::FindingsAdded { .. } => "findings_added",
            Self::Assigned { .. } => "assigned",
            Self::StatusChanged { .. } => "status_changed",
        }
    }
}
