//! Case status and analyst decision.

use serde::{Deserialize, Serialize};

/// Review status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    /// Opened by the aggregator, not yet picked up.
    New,
    /// An analyst is working the case.
    UnderReview,
    /// A decision has been recorded.
    Resolved,
}

impl CaseStatus {
    /// The canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::UnderReview => "UnderReview",
            Self::Resolved => "Resolved",
        }
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [CaseStatus] {
        match self {
            Self::New => &[Self::UnderReview],
            Self::UnderReview => &[Self::Resolved],
            Self::Resolved => &[Self::UnderReview],
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "new" => Ok(Self::New),
            "underreview" => Ok(Self::UnderReview),
            "resolved" => Ok(Self::Resolved),
            _ => Err(format!("unknown case status {s:?}")),
        }
    }
}

/// Outcome recorded when a case is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseDecision {
    /// Confirmed fraud or money laundering.
    Fraudulent,
    /// Legitimate activity.
    NotFraudulent,
    /// Not enough information to decide.
    Inconclusive,
}

impl CaseDecision {
    /// The canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fraudulent => "Fraudulent",
            Self::NotFraudulent => "NotFraudulent",
            Self::Inconclusive => "Inconclusive",
        }
    }
}

impl std::fmt::Display for CaseDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "fraudulent" => Ok(Self::Fraudulent),
            "notfraudulent" => Ok(Self::NotFraudulent),
            "inconclusive" => Ok(Self::Inconclusive),
            _ => Err(format!("unknown case decision {s:?}")),
        }
    }
}
