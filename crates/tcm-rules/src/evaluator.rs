//! # Rule Evaluation
//!
//! [`RuleEvaluator`] is the extension point for rule types. Each evaluator is
//! a pure function of one rule, the transaction under evaluation and (for
//! aggregating rules) the subject's same-day history. Adding a rule type
//! means adding a [`RuleParameters`](crate::RuleParameters) variant, an
//! evaluator, and a registration in [`EvaluatorRegistry::with_builtin`].

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tcm_core::{RuleId, Severity, Transaction};

use crate::error::EvaluatorError;
use crate::evaluators::{
    BannedAccountsEvaluator, BannedCountriesEvaluator, DailyLimitEvaluator, StructuringEvaluator,
};
use crate::evidence::Evidence;
use crate::rule::{ActiveRule, RuleType};

/// Input to a single evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// The transaction being checked.
    pub transaction: &'a Transaction,
    /// Same-day transactions of the rule's aggregation subject. Empty for
    /// evaluators that do not declare [`RuleEvaluator::needs_history`].
    pub history: &'a [Transaction],
}

impl<'a> EvaluationContext<'a> {
    /// Context without history.
    pub fn new(transaction: &'a Transaction) -> Self {
        Self {
            transaction,
            history: &[],
        }
    }

    /// Context with the subject's same-day history.
    pub fn with_history(transaction: &'a Transaction, history: &'a [Transaction]) -> Self {
        Self {
            transaction,
            history,
        }
    }

    /// The evaluated transaction followed by every history entry on the same
    /// UTC day. The evaluated transaction appears exactly once, even when the
    /// history already contains it.
    pub fn same_day(&self) -> impl Iterator<Item = &'a Transaction> + '_ {
        let tx = self.transaction;
        let day = tx.day();
        std::iter::once(tx).chain(
            self.history
                .iter()
                .filter(move |h| h.id != tx.id && h.day() == day),
        )
    }
}

/// A rule that fired, with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Rule that fired.
    pub rule_id: RuleId,
    /// Its code.
    pub rule_code: String,
    /// Its type.
    pub rule_type: RuleType,
    /// Severity configured on the rule.
    pub severity: Severity,
    /// Rule-specific facts.
    pub evidence: Evidence,
}

impl Violation {
    /// A violation of `rule` supported by `evidence`.
    pub fn new(rule: &ActiveRule, evidence: Evidence) -> Self {
        Self {
            rule_id: rule.id,
            rule_code: rule.code.clone(),
            rule_type: rule.rule_type(),
            severity: rule.severity,
            evidence,
        }
    }
}

/// Evaluation logic for one rule type.
///
/// Implementations must be pure and must not block: the checker calls them
/// on the async executor.
pub trait RuleEvaluator: Send + Sync + fmt::Debug {
    /// The rule type this evaluator handles.
    fn rule_type(&self) -> RuleType;

    /// Whether the evaluator reads same-day history. The checker only loads
    /// history when at least one applicable rule says yes.
    fn needs_history(&self) -> bool {
        false
    }

    /// Evaluate `rule` against the context.
    ///
    /// Returns `Ok(None)` when the rule does not fire.
    fn evaluate(
        &self,
        rule: &ActiveRule,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Violation>, EvaluatorError>;
}

/// Run an evaluator, turning a panic into [`EvaluatorError::Panicked`].
///
/// # Errors
///
/// Whatever the evaluator returns, or `Panicked`.
pub fn evaluate_isolated(
    evaluator: &dyn RuleEvaluator,
    rule: &ActiveRule,
    ctx: &EvaluationContext<'_>,
) -> Result<Option<Violation>, EvaluatorError> {
    match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(rule, ctx))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(EvaluatorError::Panicked {
                code: rule.code.clone(),
                message,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Evaluators keyed by rule type.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<RuleType, Arc<dyn RuleEvaluator>>,
}

impl EvaluatorRegistry {
    /// A registry with no evaluators.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the four built-in evaluators.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(DailyLimitEvaluator));
        registry.register(Arc::new(BannedCountriesEvaluator));
        registry.register(Arc::new(BannedAccountsEvaluator));
        registry.register(Arc::new(StructuringEvaluator));
        registry
    }

    /// Register an evaluator, returning the one it replaced.
    pub fn register(&mut self, evaluator: Arc<dyn RuleEvaluator>) -> Option<Arc<dyn RuleEvaluator>> {
        self.evaluators.insert(evaluator.rule_type(), evaluator)
    }

    /// The evaluator for `rule_type`.
    pub fn get(&self, rule_type: RuleType) -> Option<&Arc<dyn RuleEvaluator>> {
        self.evaluators.get(&rule_type)
    }

    /// Registered rule types.
    pub fn rule_types(&self) -> impl Iterator<Item = RuleType> + '_ {
        self.evaluators.keys().copied()
    }
}
