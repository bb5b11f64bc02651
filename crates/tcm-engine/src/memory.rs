//! # In-Memory Adapters
//!
//! Implementations of every port backed by `parking_lot` locks. Locks are
//! never held across an `.await`. [`MemoryCaseStore`] enforces the same
//! uniqueness rules as the PostgreSQL schema: one case per transaction and
//! one finding per `(case_id, fingerprint)`, both checked under a single
//! write lock.
//!
//! The case store and transaction source can be switched unavailable or
//! given artificial latency, for exercising the engine's failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};

use tcm_cases::{Case, CaseEventKind, CaseFinding};
use tcm_core::{AnalystId, CaseId, Severity, Transaction, TransactionId};
use tcm_rules::{AggregationSubject, ComplianceRule};

use crate::error::{PublishError, StoreError};
use crate::ports::{
    AnalystDirectory, AppendOutcome, CasePage, CaseQuery, CaseStore, CreateOutcome,
    NotificationPublisher, RuleRepository, TransactionSource, UpdateOutcome,
};

// ── Fault injection ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Faults {
    async fn enter(&self, operation: &str) -> Result<(), StoreError> {
        let latency = *self.latency.lock();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{operation}: store switched off")));
        }
        Ok(())
    }
}

// ── Transactions ───────────────────────────────────────────────────────

/// In-memory [`TransactionSource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransactionSource {
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
    faults: Arc<Faults>,
}

impl MemoryTransactionSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction, replacing any with the same id.
    pub fn insert(&self, tx: Transaction) {
        self.transactions.write().insert(tx.id, tx);
    }

    /// Record many transactions.
    pub fn extend(&self, txs: impl IntoIterator<Item = Transaction>) {
        let mut guard = self.transactions.write();
        for tx in txs {
            guard.insert(tx.id, tx);
        }
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    /// Whether no transactions are recorded.
    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionSource for MemoryTransactionSource {
    async fn same_day(
        &self,
        subject: AggregationSubject,
        day: NaiveDate,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.faults.enter("same_day").await?;
        let mut found: Vec<Transaction> = self
            .transactions
            .read()
            .values()
            .filter(|tx| subject.includes(tx) && tx.day() == day)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        self.faults.enter("get_transaction").await?;
        Ok(self.transactions.read().get(&id).cloned())
    }
}

// ── Rules ──────────────────────────────────────────────────────────────

/// In-memory [`RuleRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleRepository {
    rules: Arc<RwLock<Vec<ComplianceRule>>>,
}

impl MemoryRuleRepository {
    /// A repository holding `rules`.
    pub fn new(rules: Vec<ComplianceRule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    /// Replace all rules.
    pub fn set(&self, rules: Vec<ComplianceRule>) {
        *self.rules.write() = rules;
    }

    /// Add a rule.
    pub fn push(&self, rule: ComplianceRule) {
        self.rules.write().push(rule);
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn active(&self) -> Result<Vec<ComplianceRule>, StoreError> {
        Ok(self
            .rules
            .read()
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }
}

// ── Cases ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CaseTables {
    cases: HashMap<CaseId, Case>,
    by_transaction: HashMap<TransactionId, CaseId>,
    findings: HashMap<CaseId, Vec<CaseFinding>>,
    fingerprints: HashSet<(CaseId, String)>,
}

impl CaseTables {
    /// Insert findings not yet recorded for `case_id`; returns how many.
    fn insert_findings(&mut self, case_id: CaseId, findings: &[CaseFinding]) -> usize {
        let mut inserted = 0;
        for finding in findings {
            if self
                .fingerprints
                .insert((case_id, finding.fingerprint.clone()))
            {
                let mut finding = finding.clone();
                finding.case_id = case_id;
                self.findings.entry(case_id).or_default().push(finding);
                inserted += 1;
            }
        }
        inserted
    }
}

/// In-memory [`CaseStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCaseStore {
    tables: Arc<RwLock<CaseTables>>,
    faults: Arc<Faults>,
}

impl MemoryCaseStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cases.
    pub fn case_count(&self) -> usize {
        self.tables.read().cases.len()
    }

    /// Number of findings across all cases.
    pub fn finding_count(&self) -> usize {
        self.tables.read().fingerprints.len()
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock() = latency;
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn try_create(
        &self,
        case: &Case,
        findings: &[CaseFinding],
    ) -> Result<CreateOutcome, StoreError> {
        self.faults.enter("try_create").await?;
        let mut tables = self.tables.write();
        if let Some(existing) = tables.by_transaction.get(&case.transaction_id) {
            return Ok(CreateOutcome::Exists(*existing));
        }
        tables.by_transaction.insert(case.transaction_id, case.id);
        tables.cases.insert(case.id, case.clone());
        tables.insert_findings(case.id, findings);
        Ok(CreateOutcome::Created(case.id))
    }

    async fn append_findings(
        &self,
        case_id: CaseId,
        findings: &[CaseFinding],
    ) -> Result<AppendOutcome, StoreError> {
        self.faults.enter("append_findings").await?;
        let mut tables = self.tables.write();
        if !tables.cases.contains_key(&case_id) {
            return Err(StoreError::Corrupt(format!("case {case_id} does not exist")));
        }
        let inserted = tables.insert_findings(case_id, findings);
        let max = Severity::max_of(
            tables
                .findings
                .get(&case_id)
                .into_iter()
                .flatten()
                .map(|f| f.severity),
        );
        let now = chrono::Utc::now();
        let case = tables
            .cases
            .get_mut(&case_id)
            .ok_or_else(|| StoreError::Corrupt(format!("case {case_id} does not exist")))?;
        if let Some(max) = max {
            case.raise_severity(max, now);
        }
        Ok(AppendOutcome {
            inserted,
            severity: case.severity,
        })
    }

    async fn update(&self, case: &Case) -> Result<UpdateOutcome, StoreError> {
        self.faults.enter("update").await?;
        let mut tables = self.tables.write();
        let Some(stored) = tables.cases.get_mut(&case.id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if stored.version != case.version {
            return Ok(UpdateOutcome::Conflict);
        }
        stored.version += 1;
        stored.status = case.status;
        stored.decision = case.decision;
        stored.analyst_id = case.analyst_id;
        stored.resolved_at = case.resolved_at;
        stored.updated_at = case.updated_at;
        stored.transitions = case.transitions.clone();
        Ok(UpdateOutcome::Updated)
    }

    async fn get(&self, id: CaseId) -> Result<Option<Case>, StoreError> {
        self.faults.enter("get").await?;
        Ok(self.tables.read().cases.get(&id).cloned())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Case>, StoreError> {
        self.faults.enter("find_by_transaction").await?;
        let tables = self.tables.read();
        Ok(tables
            .by_transaction
            .get(&transaction_id)
            .and_then(|id| tables.cases.get(id))
            .cloned())
    }

    async fn findings(&self, case_id: CaseId) -> Result<Vec<CaseFinding>, StoreError> {
        self.faults.enter("findings").await?;
        let mut found = self
            .tables
            .read()
            .findings
            .get(&case_id)
            .cloned()
            .unwrap_or_default();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn list(&self, query: &CaseQuery) -> Result<CasePage, StoreError> {
        self.faults.enter("list").await?;
        let query = query.normalized();
        let mut matching: Vec<Case> = self
            .tables
            .read()
            .cases
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.opened_at.cmp(&a.opened_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.page_size as usize)
            .collect();
        Ok(CasePage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }
}

// ── Notifications ──────────────────────────────────────────────────────

/// [`NotificationPublisher`] that records events.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    events: Arc<Mutex<Vec<(CaseId, CaseEventKind)>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryPublisher {
    /// A publisher with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Published events, in order.
    pub fn events(&self) -> Vec<(CaseId, CaseEventKind)> {
        self.events.lock().clone()
    }

    /// Make every publish fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationPublisher for MemoryPublisher {
    async fn publish(&self, case_id: CaseId, event: &CaseEventKind) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("publisher switched off".into()));
        }
        self.events.lock().push((case_id, event.clone()));
        Ok(())
    }
}

// ── Analysts ───────────────────────────────────────────────────────────

/// In-memory [`AnalystDirectory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryAnalystDirectory {
    analysts: Arc<RwLock<HashSet<AnalystId>>>,
}

impl MemoryAnalystDirectory {
    /// A directory knowing `analysts`.
    pub fn new(analysts: impl IntoIterator<Item = AnalystId>) -> Self {
        Self {
            analysts: Arc::new(RwLock::new(analysts.into_iter().collect())),
        }
    }

    /// Register an analyst.
    pub fn add(&self, analyst_id: AnalystId) {
        self.analysts.write().insert(analyst_id);
    }
}

#[async_trait]
impl AnalystDirectory for MemoryAnalystDirectory {
    async fn exists(&self, analyst_id: AnalystId) -> Result<bool, StoreError> {
        Ok(self.analysts.read().contains(&analyst_id))
    }
}
