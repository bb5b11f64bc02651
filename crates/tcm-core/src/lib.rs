#![deny(missing_docs)]

//! # tcm-core — Foundational Types for the Transaction Compliance Engine
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies, only `serde`, `thiserror`, `chrono`, `uuid` and
//! `rust_decimal` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`ClientId`]
//!    where an [`AccountId`] is expected.
//!
//! 2. **Amounts are [`rust_decimal::Decimal`].** Monetary values are never
//!    floating point; base-currency amounts arrive already FX-normalized.
//!
//! 3. **Country codes are validated once.** [`CountryCode`] is upper-case
//!    ISO-3166 alpha-2 by construction, so scope matching and banned-country
//!    lookups compare normalized values only.
//!
//! 4. **Days are UTC calendar days.** [`utc_day`] is the single definition of
//!    the aggregation window used by daily rules.

pub mod country;
pub mod error;
pub mod identity;
pub mod severity;
pub mod temporal;
pub mod transaction;

pub use country::CountryCode;
pub use error::ValidationError;
pub use identity::{AccountId, AnalystId, CaseId, ClientId, FindingId, RuleId, TransactionId};
pub use severity::Severity;
pub use temporal::{utc_day, utc_day_bounds};
pub use transaction::{
    Counterparty, IdentifierType, Transaction, TransactionType, TransferMethod,
};
