//! # Compliance Checker
//!
//! Evaluates a transaction against one catalog snapshot and hands any
//! violations to the [`CaseAggregator`].
//!
//! Evaluation fails open: an evaluator that errors or panics is logged and
//! skipped, and the remaining rules still run. History for aggregating rules
//! is loaded once per distinct aggregation subject, and only when such a
//! rule applies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tcm_core::{CaseId, Severity, Transaction};
use tcm_rules::{
    evaluate_isolated, AggregationSubject, CatalogHandle, EvaluationContext, EvaluatorRegistry,
    Violation,
};

use crate::aggregator::{AttachOutcome, CaseAggregator};
use crate::deadline::within;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;
use crate::ports::TransactionSource;

/// Result of checking one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No applicable rule fired.
    Clear,
    /// A case was opened for the transaction.
    CaseOpened {
        /// The new case.
        case_id: CaseId,
        /// Findings recorded.
        findings: usize,
        /// Case severity.
        severity: Severity,
    },
    /// New findings were added to the transaction's existing case.
    FindingsAppended {
        /// The existing case.
        case_id: CaseId,
        /// Findings inserted.
        inserted: usize,
        /// Case severity afterwards.
        severity: Severity,
    },
    /// The transaction's case already held every finding.
    AlreadyRecorded {
        /// The existing case.
        case_id: CaseId,
    },
}

impl CheckOutcome {
    /// The case involved, if any.
    pub fn case_id(&self) -> Option<CaseId> {
        match self {
            Self::Clear => None,
            Self::CaseOpened { case_id, .. }
            | Self::FindingsAppended { case_id, .. }
            | Self::AlreadyRecorded { case_id } => Some(*case_id),
        }
    }
}

impl From<AttachOutcome> for CheckOutcome {
    fn from(outcome: AttachOutcome) -> Self {
        match outcome {
            AttachOutcome::Created {
                case_id,
                findings,
                severity,
            } => Self::CaseOpened {
                case_id,
                findings,
                severity,
            },
            AttachOutcome::Appended {
                case_id,
                inserted,
                severity,
            } => Self::FindingsAppended {
                case_id,
                inserted,
                severity,
            },
            AttachOutcome::Unchanged { case_id } => Self::AlreadyRecorded { case_id },
            AttachOutcome::Skipped => Self::Clear,
        }
    }
}

/// Runs the catalog's rules against transactions. Cheap to clone; clones
/// share the catalog, evaluators and ports.
#[derive(Clone)]
pub struct ComplianceChecker {
    catalog: CatalogHandle,
    registry: Arc<EvaluatorRegistry>,
    transactions: Arc<dyn TransactionSource>,
    aggregator: CaseAggregator,
    store_timeout: Duration,
    metrics: Option<EngineMetrics>,
}

impl std::fmt::Debug for ComplianceChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceChecker")
            .field("catalog", &self.catalog)
            .field("registry", &self.registry)
            .field("aggregator", &self.aggregator)
            .field("store_timeout", &self.store_timeout)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ComplianceChecker {
    /// Checker reading rules from `catalog` and history from `transactions`.
    pub fn new(
        catalog: CatalogHandle,
        registry: Arc<EvaluatorRegistry>,
        transactions: Arc<dyn TransactionSource>,
        aggregator: CaseAggregator,
        store_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            registry,
            transactions,
            aggregator,
            store_timeout,
            metrics: None,
        }
    }

    /// Record check outcomes, violations and evaluation failures in
    /// `metrics`.
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The metrics this checker records into, if any.
    pub fn metrics(&self) -> Option<&EngineMetrics> {
        self.metrics.as_ref()
    }

    /// The catalog handle this checker reads.
    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Evaluate `tx` and record a case when any rule fires.
    ///
    /// Idempotent: checking the same transaction again reconciles with its
    /// existing case and never duplicates findings.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when history cannot be loaded or the case
    /// cannot be written.
    pub async fn check_and_create_case_if_needed(
        &self,
        tx: &Transaction,
    ) -> Result<CheckOutcome, EngineError> {
        let started = Instant::now();
        let result = self.check(tx).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_check(&result, started.elapsed());
        }
        result
    }

    async fn check(&self, tx: &Transaction) -> Result<CheckOutcome, EngineError> {
        let violations = self.evaluate(tx).await?;
        if violations.is_empty() {
            tracing::debug!(transaction_id = %tx.id, "transaction clear");
            return Ok(CheckOutcome::Clear);
        }
        let outcome = self.aggregator.attach_or_create(tx, &violations).await?;
        Ok(outcome.into())
    }

    /// Violations of `tx` against the current catalog snapshot, without
    /// recording anything.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when same-day history cannot be loaded.
    pub async fn evaluate(&self, tx: &Transaction) -> Result<Vec<Violation>, EngineError> {
        let catalog = self.catalog.snapshot();

        let mut selected = Vec::new();
        for rule in catalog.applicable(tx) {
            match self.registry.get(rule.rule_type()) {
                Some(evaluator) => selected.push((rule, Arc::clone(evaluator))),
                None => tracing::error!(
                    rule_code = %rule.code,
                    rule_type = %rule.rule_type(),
                    "no evaluator registered, rule skipped"
                ),
            }
        }

        let mut history: HashMap<AggregationSubject, Vec<Transaction>> = HashMap::new();
        for (rule, evaluator) in &selected {
            if !evaluator.needs_history() {
                continue;
            }
            let subject = rule.scope.subject_for(tx);
            if history.contains_key(&subject) {
                continue;
            }
            let same_day = within(
                self.store_timeout,
                "same_day",
                self.transactions.same_day(subject, tx.day()),
            )
            .await?;
            history.insert(subject, same_day);
        }

        let mut violations = Vec::new();
        for (rule, evaluator) in &selected {
            let ctx = if evaluator.needs_history() {
                let subject = rule.scope.subject_for(tx);
                let entries = history.get(&subject).map(Vec::as_slice).unwrap_or_default();
                EvaluationContext::with_history(tx, entries)
            } else {
                EvaluationContext::new(tx)
            };
            match evaluate_isolated(evaluator.as_ref(), rule, &ctx) {
                Ok(Some(violation)) => {
                    tracing::warn!(
                        transaction_id = %tx.id,
                        rule_code = %rule.code,
                        rule_type = %violation.rule_type,
                        severity = %violation.severity,
                        evidence = violation.evidence.kind(),
                        "rule violated"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_violation(violation.rule_type, violation.severity);
                    }
                    violations.push(violation);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        transaction_id = %tx.id,
                        rule_code = %rule.code,
                        error = %e,
                        "rule evaluation failed, skipped"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_evaluation_failure(rule.rule_type());
                    }
                }
            }
        }
        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCaseStore, MemoryPublisher, MemoryTransactionSource};
    use crate::ports::CaseStore as _;
    use crate::StoreError;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tcm_core::{AccountId, ClientId, CountryCode, Counterparty, RuleId, TransactionType};
    use tcm_rules::{
        ActiveRule, ComplianceRule, EvaluatorError, RuleCatalog, RuleEvaluator, RuleType,
    };

    struct Harness {
        checker: ComplianceChecker,
        transactions: MemoryTransactionSource,
        store: MemoryCaseStore,
    }

    fn harness(rules: Vec<ComplianceRule>, registry: EvaluatorRegistry) -> Harness {
        let transactions = MemoryTransactionSource::new();
        let store = MemoryCaseStore::new();
        let aggregator = CaseAggregator::new(
            Arc::new(store.clone()),
            Arc::new(MemoryPublisher::new()),
            Duration::from_secs(1),
        );
        let checker = ComplianceChecker::new(
            CatalogHandle::new(RuleCatalog::load(rules, Utc::now())),
            Arc::new(registry),
            Arc::new(transactions.clone()),
            aggregator,
            Duration::from_secs(1),
        );
        Harness {
            checker,
            transactions,
            store,
        }
    }

    fn rule(code: &str, rule_type: RuleType, scope: Option<&str>, params: serde_json::Value) -> ComplianceRule {
        ComplianceRule {
            id: RuleId::new(),
            code: code.into(),
            name: code.into(),
            rule_type,
            is_active: true,
            severity: Severity::High,
            scope: scope.map(str::to_string),
            parameters: params,
            updated_at: Utc::now(),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, hour, 0, 0).unwrap()
    }

    fn deposit(client: ClientId, account: AccountId, base: Decimal, hour: u32) -> Transaction {
        Transaction::new(
            client,
            account,
            TransactionType::Deposit,
            base,
            "BRL",
            base,
            "BRL",
            at(hour),
        )
        .unwrap()
    }

    fn transfer_to(country: &str) -> Transaction {
        Transaction::new(
            ClientId::new(),
            AccountId::new(),
            TransactionType::Transfer,
            dec!(10),
            "USD",
            dec!(50),
            "BRL",
            at(9),
        )
        .unwrap()
        .with_counterparty(Counterparty {
            country: Some(CountryCode::new(country).unwrap()),
            ..Counterparty::default()
        })
    }

    #[derive(Debug)]
    struct Exploding;

    impl RuleEvaluator for Exploding {
        fn rule_type(&self) -> RuleType {
            RuleType::DailyLimit
        }

        fn evaluate(
            &self,
            _rule: &ActiveRule,
            _ctx: &EvaluationContext<'_>,
        ) -> Result<Option<Violation>, EvaluatorError> {
            panic!("evaluator bug");
        }
    }

    #[tokio::test]
    async fn clear_transaction_opens_no_case() {
        let h = harness(
            vec![rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] }))],
            EvaluatorRegistry::with_builtin(),
        );
        let outcome = h
            .checker
            .check_and_create_case_if_needed(&transfer_to("US"))
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::Clear);
        assert_eq!(h.store.case_count(), 0);
    }

    #[tokio::test]
    async fn violation_opens_case_and_recheck_is_idempotent() {
        let h = harness(
            vec![rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] }))],
            EvaluatorRegistry::with_builtin(),
        );
        let tx = transfer_to("IR");
        let first = h.checker.check_and_create_case_if_needed(&tx).await.unwrap();
        let CheckOutcome::CaseOpened { case_id, findings, severity } = first else {
            panic!("expected CaseOpened, got {first:?}");
        };
        assert_eq!(findings, 1);
        assert_eq!(severity, Severity::High);

        let second = h.checker.check_and_create_case_if_needed(&tx).await.unwrap();
        assert_eq!(second, CheckOutcome::AlreadyRecorded { case_id });
        assert_eq!(h.store.case_count(), 1);
        assert_eq!(h.store.finding_count(), 1);
    }

    #[tokio::test]
    async fn scoped_rule_ignores_other_countries() {
        let h = harness(
            vec![rule("BC-BR", RuleType::BannedCountries, Some("BR"), json!({ "countries": ["US"] }))],
            EvaluatorRegistry::with_builtin(),
        );
        let outcome = h
            .checker
            .check_and_create_case_if_needed(&transfer_to("US"))
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::Clear);
    }

    #[tokio::test]
    async fn daily_limit_uses_same_day_history() {
        let h = harness(
            vec![rule("DL", RuleType::DailyLimit, None, json!({ "limitBaseAmount": 1000 }))],
            EvaluatorRegistry::with_builtin(),
        );
        let client = ClientId::new();
        let earlier = deposit(client, AccountId::new(), dec!(600), 8);
        h.transactions.insert(earlier);

        let at_limit = deposit(client, AccountId::new(), dec!(400), 9);
        h.transactions.insert(at_limit.clone());
        assert_eq!(
            h.checker.check_and_create_case_if_needed(&at_limit).await.unwrap(),
            CheckOutcome::Clear
        );

        let over = deposit(client, AccountId::new(), dec!(0.01), 10);
        h.transactions.insert(over.clone());
        let violations = h.checker.evaluate(&over).await.unwrap();
        assert_eq!(violations.len(), 1);
        match &violations[0].evidence {
            tcm_rules::Evidence::DailyLimit { total, .. } => assert_eq!(*total, dec!(1000.01)),
            other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_evaluator_does_not_suppress_others() {
        let mut registry = EvaluatorRegistry::with_builtin();
        registry.register(Arc::new(Exploding));
        let h = harness(
            vec![
                rule("DL", RuleType::DailyLimit, None, json!({ "limitBaseAmount": 1 })),
                rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] })),
            ],
            registry,
        );
        let outcome = h
            .checker
            .check_and_create_case_if_needed(&transfer_to("IR"))
            .await
            .unwrap();
        let case_id = outcome.case_id().unwrap();
        let findings = h.store.findings(case_id).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_code, "BC");
    }

    #[tokio::test]
    async fn unregistered_rule_type_is_skipped() {
        let h = harness(
            vec![rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] }))],
            EvaluatorRegistry::empty(),
        );
        let outcome = h
            .checker
            .check_and_create_case_if_needed(&transfer_to("IR"))
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::Clear);
    }

    #[tokio::test]
    async fn history_is_not_loaded_without_aggregating_rules() {
        let h = harness(
            vec![rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] }))],
            EvaluatorRegistry::with_builtin(),
        );
        h.transactions.set_unavailable(true);
        let outcome = h
            .checker
            .check_and_create_case_if_needed(&transfer_to("IR"))
            .await
            .unwrap();
        assert!(matches!(outcome, CheckOutcome::CaseOpened { .. }));
    }

    #[tokio::test]
    async fn history_failure_surfaces_as_store_error() {
        let h = harness(
            vec![rule("DL", RuleType::DailyLimit, None, json!({ "limitBaseAmount": 1 }))],
            EvaluatorRegistry::with_builtin(),
        );
        h.transactions.set_unavailable(true);
        let err = h
            .checker
            .check_and_create_case_if_needed(&deposit(ClientId::new(), AccountId::new(), dec!(5), 9))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn catalog_refresh_applies_to_next_check() {
        let h = harness(Vec::new(), EvaluatorRegistry::with_builtin());
        let tx = transfer_to("IR");
        assert_eq!(
            h.checker.check_and_create_case_if_needed(&tx).await.unwrap(),
            CheckOutcome::Clear
        );
        h.checker.catalog().replace(RuleCatalog::load(
            vec![rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] }))],
            Utc::now(),
        ));
        assert!(matches!(
            h.checker.check_and_create_case_if_needed(&tx).await.unwrap(),
            CheckOutcome::CaseOpened { .. }
        ));
    }

    #[tokio::test]
    async fn metrics_count_outcomes_and_failures() {
        let mut registry = EvaluatorRegistry::with_builtin();
        registry.register(Arc::new(Exploding));
        let h = harness(
            vec![
                rule("DL", RuleType::DailyLimit, None, json!({ "limitBaseAmount": 1 })),
                rule("BC", RuleType::BannedCountries, None, json!({ "countries": ["IR"] })),
            ],
            registry,
        );
        let metrics = EngineMetrics::new().unwrap();
        let checker = h.checker.clone().with_metrics(metrics.clone());

        let tx = transfer_to("IR");
        checker.check_and_create_case_if_needed(&tx).await.unwrap();
        checker.check_and_create_case_if_needed(&tx).await.unwrap();

        assert_eq!(metrics.checks("case_opened"), 1);
        assert_eq!(metrics.checks("already_recorded"), 1);
        assert_eq!(metrics.violations(), 2);
        assert_eq!(metrics.evaluation_failures(RuleType::DailyLimit), 2);
    }
}
