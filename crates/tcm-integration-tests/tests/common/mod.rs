//! Fixtures shared by the integration tests: an engine wired to in-memory
//! adapters and builders for rules and transactions.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use tcm_core::{
    AccountId, ClientId, CountryCode, Counterparty, IdentifierType, RuleId, Severity, Transaction,
    TransactionType, TransferMethod,
};
use tcm_engine::memory::{
    MemoryAnalystDirectory, MemoryCaseStore, MemoryPublisher, MemoryRuleRepository,
    MemoryTransactionSource,
};
use tcm_engine::{CaseAggregator, CaseReviewService, CatalogRefresher, ComplianceChecker};
use tcm_rules::{CatalogHandle, ComplianceRule, EvaluatorRegistry, RuleCatalog, RuleType};

pub struct Engine {
    pub checker: ComplianceChecker,
    pub review: CaseReviewService,
    pub refresher: CatalogRefresher,
    pub rules: MemoryRuleRepository,
    pub transactions: MemoryTransactionSource,
    pub cases: MemoryCaseStore,
    pub publisher: MemoryPublisher,
    pub analysts: MemoryAnalystDirectory,
}

impl Engine {
    pub async fn new(rules: Vec<ComplianceRule>) -> Self {
        Self::with_registry(rules, EvaluatorRegistry::with_builtin()).await
    }

    pub async fn with_registry(rules: Vec<ComplianceRule>, registry: EvaluatorRegistry) -> Self {
        let timeout = Duration::from_secs(2);
        let repo = MemoryRuleRepository::new(rules);
        let transactions = MemoryTransactionSource::new();
        let cases = MemoryCaseStore::new();
        let publisher = MemoryPublisher::new();
        let analysts = MemoryAnalystDirectory::default();

        let handle = CatalogHandle::new(RuleCatalog::empty(Utc::now()));
        let refresher = CatalogRefresher::new(
            Arc::new(repo.clone()),
            handle.clone(),
            Duration::from_secs(300),
            timeout,
        );
        refresher.refresh().await.unwrap();

        let checker = ComplianceChecker::new(
            handle,
            Arc::new(registry),
            Arc::new(transactions.clone()),
            CaseAggregator::new(Arc::new(cases.clone()), Arc::new(publisher.clone()), timeout),
            timeout,
        );
        let review = CaseReviewService::new(
            Arc::new(cases.clone()),
            Arc::new(publisher.clone()),
            timeout,
        )
        .with_analyst_directory(Arc::new(analysts.clone()));

        Self {
            checker,
            review,
            refresher,
            rules: repo,
            transactions,
            cases,
            publisher,
            analysts,
        }
    }

    /// Record `tx` the way the creation pipeline does, then check it.
    pub async fn record_and_check(
        &self,
        tx: &Transaction,
    ) -> Result<tcm_engine::CheckOutcome, tcm_engine::EngineError> {
        self.transactions.insert(tx.clone());
        self.checker.check_and_create_case_if_needed(tx).await
    }
}

pub fn rule(code: &str, rule_type: RuleType, severity: Severity, scope: Option<&str>, parameters: Value) -> ComplianceRule {
    ComplianceRule {
        id: RuleId::new(),
        code: code.into(),
        name: code.into(),
        rule_type,
        is_active: true,
        severity,
        scope: scope.map(str::to_string),
        parameters,
        updated_at: Utc::now(),
    }
}

pub fn day_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 17, hour, minute, 0).unwrap()
}

pub fn deposit(client: ClientId, account: AccountId, base: Decimal, at: DateTime<Utc>) -> Transaction {
    Transaction::new(client, account, TransactionType::Deposit, base, "BRL", base, "BRL", at).unwrap()
}

pub fn transfer(client: ClientId, country: &str, identifier: Option<&str>) -> Transaction {
    Transaction::new(
        client,
        AccountId::new(),
        TransactionType::Transfer,
        Decimal::from(250),
        "USD",
        Decimal::from(1300),
        "BRL",
        day_at(14, 0),
    )
    .unwrap()
    .with_transfer_method(TransferMethod::Swift)
    .with_account_country(CountryCode::new("BR").unwrap())
    .with_counterparty(Counterparty {
        name: Some("Counterparty Ltd".into()),
        identifier_type: identifier.map(|_| IdentifierType::Iban),
        identifier: identifier.map(str::to_string),
        country: Some(CountryCode::new(country).unwrap()),
        ..Counterparty::default()
    })
}
