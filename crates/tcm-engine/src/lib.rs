#![deny(missing_docs)]

//! # tcm-engine — Transaction Compliance Engine
//!
//! Orchestrates the compliance flow around the pure pieces in `tcm-rules`
//! and `tcm-cases`:
//!
//! ```text
//! Transaction ──▶ ComplianceChecker ──snapshot──▶ RuleCatalog
//!                     │  └─same-day history──▶ TransactionSource
//!                     ▼
//!                CaseAggregator ──get-or-create──▶ CaseStore
//!                     │
//!                     └─best effort──▶ NotificationPublisher
//!
//! Reviewer ──▶ CaseReviewService ──lifecycle──▶ CaseStore
//! ```
//!
//! Every collaborator is reached through a trait in [`ports`]. In-memory
//! implementations live in [`memory`]; PostgreSQL ones in `tcm-store`.
//!
//! ## Concurrency
//!
//! The engine holds no locks of its own. At most one case per transaction
//! is guaranteed by the store's unique constraint and the aggregator's
//! reconciliation of [`CreateOutcome::Exists`]. Every store call runs under
//! the configured deadline and is cancelled by dropping its future.

pub mod aggregator;
pub mod bulk;
pub mod checker;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod notify;
pub mod ports;
pub mod refresh;
pub mod review;

mod deadline;

pub use aggregator::{AttachOutcome, CaseAggregator};
pub use bulk::{BatchItem, BatchReport};
pub use checker::{CheckOutcome, ComplianceChecker};
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, PublishError, StoreError};
pub use metrics::EngineMetrics;
pub use notify::LogPublisher;
pub use ports::{
    AnalystDirectory, AppendOutcome, CasePage, CaseQuery, CaseStore, CreateOutcome,
    NotificationPublisher, RuleRepository, TransactionSource, UpdateOutcome,
};
pub use refresh::CatalogRefresher;
pub use review::CaseReviewService;
