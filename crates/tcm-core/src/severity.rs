//! # Severity
//!
//! Rule and case severity with a total order:
//!
//! ```text
//! Low < Medium < High < Critical
//! ```
//!
//! A case's severity is the maximum over its findings, so the order is the
//! only operation the aggregator needs. [`Severity::rank`] is the stable
//! integer form used by persistence.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How serious a rule violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; review when convenient.
    Low,
    /// Default for most threshold rules.
    Medium,
    /// Requires prompt analyst attention.
    High,
    /// Sanctions-grade; review immediately.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub fn all() -> &'static [Severity] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }

    /// The canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Stable integer rank (0 = Low). Persisted, so never renumber.
    pub fn rank(&self) -> i16 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// Inverse of [`Severity::rank`].
    pub fn from_rank(rank: i16) -> Option<Self> {
        match rank {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            3 => Some(Self::Critical),
            _ => None,
        }
    }

    /// Maximum severity of an iterator, or `None` when empty.
    pub fn max_of(iter: impl IntoIterator<Item = Severity>) -> Option<Severity> {
        iter.into_iter().max()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ValidationError::UnknownSeverity(s.to_string())),
        }
    }
}
