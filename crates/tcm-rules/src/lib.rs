#![deny(missing_docs)]

//! # tcm-rules — Compliance Rules and Evaluators
//!
//! Holds everything needed to decide whether a single transaction violates a
//! configured rule:
//!
//! - [`ComplianceRule`]: the rule as stored by configuration management, with
//!   its parameters still raw JSON.
//! - [`RuleParameters`]: the closed, typed union the raw parameters are parsed
//!   into exactly once, when a rule enters the catalog.
//! - [`RuleCatalog`] / [`CatalogHandle`]: an immutable snapshot of the valid
//!   active rules, swapped atomically on refresh.
//! - [`RuleEvaluator`]: one pure evaluator per [`RuleType`], looked up through
//!   the [`EvaluatorRegistry`].
//!
//! Evaluation is synchronous and free of I/O. Same-day history, when a rule
//! needs it, is loaded by the caller and handed in through
//! [`EvaluationContext`].

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod evaluators;
pub mod evidence;
pub mod params;
pub mod rule;

pub use catalog::{CatalogHandle, RejectedRule, RuleCatalog};
pub use error::{EvaluatorError, RuleConfigError};
pub use evaluator::{evaluate_isolated, EvaluationContext, EvaluatorRegistry, RuleEvaluator, Violation};
pub use evidence::{Evidence, MatchedField};
pub use params::{
    BannedAccountsParams, BannedCountriesParams, DailyLimitParams, RuleParameters,
    StructuringParams,
};
pub use rule::{ActiveRule, AggregationSubject, ComplianceRule, RuleScope, RuleType};
