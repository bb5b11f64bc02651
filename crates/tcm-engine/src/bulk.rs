//! # Bulk Checking
//!
//! Drives many transactions through one [`ComplianceChecker`] with bounded
//! concurrency, for bulk imports and replays. Each transaction runs in its
//! own task; a failure or panic in one never aborts the others.

use std::sync::Arc;

use tokio::sync::Semaphore;

use tcm_core::{Transaction, TransactionId};

use crate::checker::{CheckOutcome, ComplianceChecker};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Result for one transaction of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// The transaction checked.
    pub transaction_id: TransactionId,
    /// What happened.
    pub result: Result<CheckOutcome, EngineError>,
}

/// Results of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// One item per input transaction.
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&CheckOutcome) -> bool) -> usize {
        self.items
            .iter()
            .filter(|item| item.result.as_ref().is_ok_and(&pred))
            .count()
    }

    /// Transactions with no violation.
    pub fn clear(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::Clear))
    }

    /// Transactions that opened a case.
    pub fn cases_opened(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::CaseOpened { .. }))
    }

    /// Transactions that added findings to an existing case.
    pub fn findings_appended(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::FindingsAppended { .. }))
    }

    /// Transactions whose case already held every finding.
    pub fn already_recorded(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::AlreadyRecorded { .. }))
    }

    /// Failed transactions.
    pub fn failures(&self) -> impl Iterator<Item = (&TransactionId, &EngineError)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().err().map(|e| (&item.transaction_id, e)))
    }

    /// Number of failed transactions.
    pub fn failed(&self) -> usize {
        self.failures().count()
    }
}

impl ComplianceChecker {
    /// Check `transactions`, at most `concurrency` at a time (clamped to
    /// `1..=`[`EngineConfig::MAX_BULK_CONCURRENCY`]).
    pub async fn check_batch(&self, transactions: Vec<Transaction>, concurrency: usize) -> BatchReport {
        let limit = concurrency.clamp(1, EngineConfig::MAX_BULK_CONCURRENCY);
        let semaphore = Arc::new(Semaphore::new(limit));
        tracing::info!(transactions = transactions.len(), concurrency = limit, "batch check started");

        let mut pending = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let transaction_id = tx.id;
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    pending.push((transaction_id, Err(EngineError::Aborted(e.to_string()))));
                    continue;
                }
            };
            let checker = self.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                checker.check_and_create_case_if_needed(&tx).await
            });
            pending.push((transaction_id, Ok(handle)));
        }

        let mut report = BatchReport {
            items: Vec::with_capacity(pending.len()),
        };
        for (transaction_id, task) in pending {
            let result = match task {
                Ok(handle) => match handle.await {
                    Ok(result) => result,
                    Err(join) => Err(EngineError::Aborted(join.to_string())),
                },
                Err(e) => Err(e),
            };
            if let Err(ref e) = result {
                tracing::error!(transaction_id = %transaction_id, error = %e, "batch item failed");
            }
            report.items.push(BatchItem {
                transaction_id,
                result,
            });
        }

        tracing::info!(
            clear = report.clear(),
            cases_opened = report.cases_opened(),
            findings_appended = report.findings_appended(),
            already_recorded = report.already_recorded(),
            failed = report.failed(),
            "batch check finished"
        );
        report
    }
}
