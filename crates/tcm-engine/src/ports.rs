//! # Ports
//!
//! Narrow async interfaces to the engine's collaborators. All are object
//! safe and `Send + Sync` so the engine can hold them as `Arc<dyn _>`.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tcm_cases::{Case, CaseEventKind, CaseFinding, CaseStatus};
use tcm_core::{AnalystId, CaseId, ClientId, Severity, Transaction, TransactionId};
use tcm_rules::{AggregationSubject, ComplianceRule};

use crate::error::{PublishError, StoreError};

// ---------------------------------------------------------------------------
// Transactions and rules
// ---------------------------------------------------------------------------

/// Read access to recorded transactions.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Transactions of `subject` that occurred on UTC day `day`. May or may
    /// not include the transaction currently being checked.
    async fn same_day(
        &self,
        subject: AggregationSubject,
        day: NaiveDate,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// A transaction by id.
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;
}

/// Read access to configured rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Rules flagged active. The catalog validates them.
    async fn active(&self) -> Result<Vec<ComplianceRule>, StoreError>;
}

// ---------------------------------------------------------------------------
// Cases
// ---------------------------------------------------------------------------

/// Result of [`CaseStore::try_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The case and its findings were committed.
    Created(CaseId),
    /// A case for the transaction already exists; nothing was written.
    Exists(CaseId),
}

/// Result of [`CaseStore::append_findings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Findings actually inserted; duplicates by fingerprint are skipped.
    pub inserted: usize,
    /// Case severity after the append.
    pub severity: Severity,
}

/// Result of [`CaseStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The lifecycle fields were written and the stored version incremented.
    Updated,
    /// The stored version differs from the one the change was based on;
    /// nothing was written.
    Conflict,
    /// No case with this id.
    NotFound,
}

/// Filters and pagination for [`CaseStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseQuery {
    /// Only cases in this status.
    #[serde(default)]
    pub status: Option<CaseStatus>,
    /// Only cases at or above this severity.
    #[serde(default)]
    pub min_severity: Option<Severity>,
    /// Only cases assigned to this analyst.
    #[serde(default)]
    pub analyst_id: Option<AnalystId>,
    /// Only cases of this client.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    /// One-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page, clamped to `1..=100`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    CaseQuery::DEFAULT_PAGE_SIZE
}

impl Default for CaseQuery {
    fn default() -> Self {
        Self {
            status: None,
            min_severity: None,
            analyst_id: None,
            client_id: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl CaseQuery {
    /// Page size when none is given.
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    /// Largest page size honored.
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// The query with `page >= 1` and `page_size` in `1..=100`.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, Self::MAX_PAGE_SIZE),
            ..self.clone()
        }
    }

    /// Rows to skip for the normalized page.
    pub fn offset(&self) -> u64 {
        let q = self.normalized();
        u64::from(q.page - 1) * u64::from(q.page_size)
    }

    /// Whether `case` passes every filter.
    pub fn matches(&self, case: &Case) -> bool {
        self.status.map_or(true, |s| case.status == s)
            && self.min_severity.map_or(true, |s| case.severity >= s)
            && self.analyst_id.map_or(true, |a| case.analyst_id == Some(a))
            && self.client_id.map_or(true, |c| case.client_id == c)
    }
}

/// One page of cases, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePage {
    /// Cases on this page.
    pub items: Vec<Case>,
    /// Cases matching the filters across all pages.
    pub total: u64,
    /// Page number served.
    pub page: u32,
    /// Page size served.
    pub page_size: u32,
}

/// Case and finding persistence.
///
/// Implementations must enforce at most one case per transaction and at most
/// one finding per `(case_id, fingerprint)`.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Atomically create `case` with `findings`, or report the existing case
    /// for the same transaction.
    async fn try_create(
        &self,
        case: &Case,
        findings: &[CaseFinding],
    ) -> Result<CreateOutcome, StoreError>;

    /// Attach findings to an existing case, skipping known fingerprints, and
    /// raise the case severity to the maximum over all its findings.
    async fn append_findings(
        &self,
        case_id: CaseId,
        findings: &[CaseFinding],
    ) -> Result<AppendOutcome, StoreError>;

    /// Persist lifecycle fields (status, decision, analyst, timestamps,
    /// transitions) if the stored `version` still equals `case.version`, and
    /// increment it. Severity is owned by [`CaseStore::append_findings`] and
    /// is not written.
    async fn update(&self, case: &Case) -> Result<UpdateOutcome, StoreError>;

    /// A case by id.
    async fn get(&self, id: CaseId) -> Result<Option<Case>, StoreError>;

    /// The case for a transaction.
    async fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Case>, StoreError>;

    /// Findings of a case, oldest first.
    async fn findings(&self, case_id: CaseId) -> Result<Vec<CaseFinding>, StoreError>;

    /// Cases matching `query`, newest first.
    async fn list(&self, query: &CaseQuery) -> Result<CasePage, StoreError>;
}

// ---------------------------------------------------------------------------
// Notifications and analysts
// ---------------------------------------------------------------------------

/// Outbound case notifications. Failures never fail the operation that
/// produced the event.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish one event.
    async fn publish(&self, case_id: CaseId, event: &CaseEventKind) -> Result<(), PublishError>;
}

/// Known analysts.
#[async_trait]
pub trait AnalystDirectory: Send + Sync {
    /// Whether `analyst_id` exists.
    async fn exists(&self, analyst_id: AnalystId) -> Result<bool, StoreError>;
}
