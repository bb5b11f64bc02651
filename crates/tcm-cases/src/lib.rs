#![deny(missing_docs)]

//! # tcm-cases — Compliance Cases and the Review Lifecycle
//!
//! A [`Case`] groups the findings raised against one transaction. There is
//! at most one case per transaction; findings are immutable and carry a
//! fingerprint so the same violation is never recorded twice.
//!
//! ## Lifecycle
//!
//! ```text
//! New ──assign / update(analyst)──▶ UnderReview ──update(decision)──▶ Resolved
//!                                        ▲                               │
//!                                        └──────── update(UnderReview) ──┘
//! ```
//!
//! `New` is never re-entered. Every transition is validated by
//! [`Case::assign_analyst`] or [`Case::apply_update`], applied all-or-nothing,
//! and appended to [`Case::transitions`].

pub mod case;
pub mod error;
pub mod event;
pub mod finding;
pub mod status;

pub use case::{Case, CaseTransition, CaseUpdate};
pub use error::LifecycleError;
pub use event::CaseEventKind;
pub use finding::{fingerprint, CaseFinding};
pub use status::{CaseDecision, CaseStatus};
pub use tcm_rules::{Evidence, MatchedField};
