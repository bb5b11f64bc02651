//! # Rule Catalog
//!
//! A [`RuleCatalog`] is an immutable snapshot of the active rules whose
//! configuration parsed, plus the time it was built. [`CatalogHandle`] holds
//! the current snapshot behind an `Arc` so every check reads one consistent
//! set of rules, and a refresh swaps the pointer without blocking readers
//! for longer than a clone.
//!
//! There is no background refresh. The host decides when to rebuild
//! (see [`CatalogHandle::is_stale`]); until then, rule changes are not seen.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use tcm_core::{RuleId, Transaction};

use crate::error::RuleConfigError;
use crate::rule::{ActiveRule, ComplianceRule};

/// An active rule that was left out of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRule {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Rule code as stored.
    pub code: String,
    /// Why it was rejected.
    pub error: RuleConfigError,
}

/// Immutable snapshot of evaluable rules.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<ActiveRule>,
    rejected: Vec<RejectedRule>,
    refreshed_at: DateTime<Utc>,
}

impl RuleCatalog {
    /// Build a catalog from stored rules.
    ///
    /// Inactive rules are skipped silently. Active rules with a configuration
    /// error are logged and recorded in [`RuleCatalog::rejected`]. Rules are
    /// ordered by code so evaluation order is deterministic.
    pub fn load(stored: impl IntoIterator<Item = ComplianceRule>, now: DateTime<Utc>) -> Self {
        let mut rules = Vec::new();
        let mut rejected = Vec::new();
        for rule in stored {
            if !rule.is_active {
                continue;
            }
            match ActiveRule::from_rule(&rule) {
                Ok(active) => rules.push(active),
                Err(error) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        rule_code = %rule.code,
                        rule_type = %rule.rule_type,
                        error = %error,
                        "rule configuration invalid, excluded from catalog"
                    );
                    rejected.push(RejectedRule {
                        rule_id: rule.id,
                        code: rule.code,
                        error,
                    });
                }
            }
        }
        rules.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
        tracing::debug!(
            rules = rules.len(),
            rejected = rejected.len(),
            "rule catalog loaded"
        );
        Self {
            rules,
            rejected,
            refreshed_at: now,
        }
    }

    /// A catalog with no rules.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            rules: Vec::new(),
            rejected: Vec::new(),
            refreshed_at: now,
        }
    }

    /// Evaluable rules, ordered by code.
    pub fn rules(&self) -> &[ActiveRule] {
        &self.rules
    }

    /// Active rules that failed to parse.
    pub fn rejected(&self) -> &[RejectedRule] {
        &self.rejected
    }

    /// When this snapshot was built.
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Rules whose scope matches `tx`.
    pub fn applicable<'a>(&'a self, tx: &'a Transaction) -> impl Iterator<Item = &'a ActiveRule> {
        self.rules.iter().filter(move |rule| rule.applies_to(tx))
    }

    /// Number of evaluable rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no evaluable rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Shared, swappable reference to the current catalog.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<RuleCatalog>>>,
}

impl CatalogHandle {
    /// Handle starting at `catalog`.
    pub fn new(catalog: RuleCatalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// The current snapshot. Later refreshes do not affect it.
    pub fn snapshot(&self) -> Arc<RuleCatalog> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot.
    pub fn replace(&self, catalog: RuleCatalog) {
        *self.current.write() = Arc::new(catalog);
    }

    /// Whether the current snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.current.read().refreshed_at() >= max_age
    }
}
