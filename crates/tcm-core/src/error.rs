//! # Validation Errors
//!
//! Domain primitive validation failures, raised at construction time so that
//! invalid values never reach the evaluators.

use thiserror::Error;

/// Errors from validating domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Country code is not a two-letter ISO-3166 alpha-2 code.
    #[error("invalid country code {0:?}: expected exactly 2 ASCII letters")]
    InvalidCountryCode(String),

    /// Severity name not recognized.
    #[error("unknown severity {0:?}: expected Low, Medium, High or Critical")]
    UnknownSeverity(String),

    /// Transaction amount must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    NonPositiveAmount {
        /// Which amount field failed.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A required text field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}
