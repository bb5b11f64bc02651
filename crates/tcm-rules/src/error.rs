//! Rule configuration and evaluation errors.

use thiserror::Error;

use crate::rule::RuleType;

/// A rule whose configuration cannot be evaluated.
///
/// Raised when a rule enters the catalog. The rule is logged and left out of
/// the snapshot; other rules are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleConfigError {
    /// Parameters are not a JSON object.
    #[error("{rule_type}: parameters must be a JSON object")]
    NotAnObject {
        /// Rule type being parsed.
        rule_type: RuleType,
    },

    /// A required parameter is absent or has the wrong JSON type.
    #[error("{rule_type}: '{field}' ({expected}) is required")]
    MissingField {
        /// Rule type being parsed.
        rule_type: RuleType,
        /// Parameter key.
        field: &'static str,
        /// Expected JSON shape, e.g. `number`.
        expected: &'static str,
    },

    /// A numeric parameter is zero or negative.
    #[error("{rule_type}: '{field}' must be > 0, got {value}")]
    NonPositive {
        /// Rule type being parsed.
        rule_type: RuleType,
        /// Parameter key.
        field: &'static str,
        /// The rejected value as written.
        value: String,
    },

    /// One element of a list parameter is malformed.
    #[error("{rule_type}: '{field}'[{index}] is invalid: {reason}")]
    InvalidEntry {
        /// Rule type being parsed.
        rule_type: RuleType,
        /// Parameter key.
        field: &'static str,
        /// Position in the list.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Scope is neither `global`, `PerAccount`, nor a country code.
    #[error("invalid rule scope {0:?}: expected \"global\", \"PerAccount\" or a 2-letter country code")]
    InvalidScope(String),

    /// Rule code is blank.
    #[error("rule code must not be blank")]
    BlankCode,
}

/// Failure while evaluating one rule against one transaction.
///
/// The checker logs these and moves on to the next rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// The rule's parameters belong to a different rule type than the
    /// evaluator it was dispatched to.
    #[error("rule {code}: evaluator for {expected} received {actual} parameters")]
    ParameterMismatch {
        /// Rule code.
        code: String,
        /// Rule type the evaluator handles.
        expected: RuleType,
        /// Rule type of the parameters received.
        actual: RuleType,
    },

    /// No evaluator is registered for the rule's type.
    #[error("no evaluator registered for rule type {0}")]
    Unregistered(RuleType),

    /// Arithmetic or data failure inside the evaluator.
    #[error("rule {code}: {message}")]
    Failed {
        /// Rule code.
        code: String,
        /// Description.
        message: String,
    },

    /// The evaluator panicked.
    #[error("rule {code}: evaluator panicked: {message}")]
    Panicked {
        /// Rule code.
        code: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}
