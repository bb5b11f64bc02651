//! # Case Aggregator
//!
//! Turns violations into a case with findings using get-or-create:
//!
//! 1. Try to create a `New` case with one finding per violation, atomically.
//! 2. If the store reports that the transaction already has a case, reload
//!    that case's fingerprints and append only the unseen findings. The
//!    store raises the case severity to the maximum over all its findings.
//!
//! The store's uniqueness constraints are the only concurrency control, so
//! concurrent or retried checks of one transaction converge on one case
//! without duplicate findings.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tcm_cases::{Case, CaseEventKind, CaseFinding};
use tcm_core::{CaseId, Severity, Transaction};
use tcm_rules::Violation;

use crate::deadline::within;
use crate::error::EngineError;
use crate::notify::publish_best_effort;
use crate::ports::{CaseStore, CreateOutcome, NotificationPublisher};

/// What [`CaseAggregator::attach_or_create`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A new case was opened.
    Created {
        /// The case.
        case_id: CaseId,
        /// Findings recorded with it.
        findings: usize,
        /// Its severity.
        severity: Severity,
    },
    /// Findings were appended to the transaction's existing case.
    Appended {
        /// The existing case.
        case_id: CaseId,
        /// Findings inserted.
        inserted: usize,
        /// Case severity afterwards.
        severity: Severity,
    },
    /// The existing case already held every finding.
    Unchanged {
        /// The existing case.
        case_id: CaseId,
    },
    /// There were no violations.
    Skipped,
}

impl AttachOutcome {
    /// The case involved, if any.
    pub fn case_id(&self) -> Option<CaseId> {
        match self {
            Self::Created { case_id, .. }
            | Self::Appended { case_id, .. }
            | Self::Unchanged { case_id } => Some(*case_id),
            Self::Skipped => None,
        }
    }
}

/// Persists violations as cases and findings.
#[derive(Clone)]
pub struct CaseAggregator {
    store: Arc<dyn CaseStore>,
    publisher: Arc<dyn NotificationPublisher>,
    store_timeout: Duration,
}

impl std::fmt::Debug for CaseAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseAggregator")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl CaseAggregator {
    /// Aggregator over `store`, notifying through `publisher`.
    pub fn new(
        store: Arc<dyn CaseStore>,
        publisher: Arc<dyn NotificationPublisher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            store_timeout,
        }
    }

    /// Record `violations` of `tx`, creating its case if needed.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when a store call fails or times out. A case
    /// committed before the failure stays committed and is reconciled on the
    /// next attempt.
    pub async fn attach_or_create(
        &self,
        tx: &Transaction,
        violations: &[Violation],
    ) -> Result<AttachOutcome, EngineError> {
        let Some(severity) = Severity::max_of(violations.iter().map(|v| v.severity)) else {
            return Ok(AttachOutcome::Skipped);
        };
        let now = Utc::now();
        let case = Case::open(tx, severity, now);
        let findings = unique_findings(
            violations
                .iter()
                .map(|v| CaseFinding::from_violation(case.id, tx.id, v, now)),
        );

        let created = within(
            self.store_timeout,
            "try_create",
            self.store.try_create(&case, &findings),
        )
        .await?;

        match created {
            CreateOutcome::Created(case_id) => {
                tracing::warn!(
                    case_id = %case_id,
                    transaction_id = %tx.id,
                    client_id = %tx.client_id,
                    severity = %severity,
                    findings = findings.len(),
                    "compliance case opened"
                );
                publish_best_effort(
                    self.publisher.as_ref(),
                    case_id,
                    &CaseEventKind::Opened { severity },
                )
                .await;
                Ok(AttachOutcome::Created {
                    case_id,
                    findings: findings.len(),
                    severity,
                })
            }
            CreateOutcome::Exists(case_id) => self.append(tx, case_id, findings).await,
        }
    }

    async fn append(
        &self,
        tx: &Transaction,
        case_id: CaseId,
        findings: Vec<CaseFinding>,
    ) -> Result<AttachOutcome, EngineError> {
        let known: HashSet<String> = within(
            self.store_timeout,
            "findings",
            self.store.findings(case_id),
        )
        .await?
        .into_iter()
        .map(|f| f.fingerprint)
        .collect();

        let fresh: Vec<CaseFinding> = findings
            .into_iter()
            .filter(|f| !known.contains(&f.fingerprint))
            .map(|mut f| {
                f.case_id = case_id;
                f
            })
            .collect();
        if fresh.is_empty() {
            tracing::debug!(
                case_id = %case_id,
                transaction_id = %tx.id,
                "every finding already recorded"
            );
            return Ok(AttachOutcome::Unchanged { case_id });
        }

        let appended = within(
            self.store_timeout,
            "append_findings",
            self.store.append_findings(case_id, &fresh),
        )
        .await?;
        // A concurrent attach may have inserted the same fingerprints first.
        if appended.inserted == 0 {
            return Ok(AttachOutcome::Unchanged { case_id });
        }

        tracing::warn!(
            case_id = %case_id,
            transaction_id = %tx.id,
            inserted = appended.inserted,
            severity = %appended.severity,
            "findings added to existing case"
        );
        publish_best_effort(
            self.publisher.as_ref(),
            case_id,
            &CaseEventKind::FindingsAdded {
                count: appended.inserted,
                severity: appended.severity,
            },
        )
        .await;
        Ok(AttachOutcome::Appended {
            case_id,
            inserted: appended.inserted,
            severity: appended.severity,
        })
    }
}

/// Drop findings whose fingerprint repeats within one batch.
fn unique_findings(findings: impl Iterator<Item = CaseFinding>) -> Vec<CaseFinding> {
    let mut seen = HashSet::new();
    findings
        .filter(|f| seen.insert(f.fingerprint.clone()))
        .collect()
}
