//! # Case and Lifecycle
//!
//! [`Case`] is created only by the aggregator and mutated only through the
//! methods here. Each lifecycle method validates the whole request against
//! a working copy and commits it only if every check passes, so a rejected
//! request leaves the case exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tcm_core::{AccountId, AnalystId, CaseId, ClientId, Severity, Transaction, TransactionId};

use crate::error::LifecycleError;
use crate::event::CaseEventKind;
use crate::status::{CaseDecision, CaseStatus};

// ── Transition Record ──────────────────────────────────────────────────

/// One status change, kept as the review audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTransition {
    /// Status before.
    pub from_status: CaseStatus,
    /// Status after.
    pub to_status: CaseStatus,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Analyst responsible at that moment.
    pub analyst_id: Option<AnalystId>,
    /// Decision recorded by this transition, when resolving.
    pub decision: Option<CaseDecision>,
}

// ── Update Request ─────────────────────────────────────────────────────

/// A reviewer's requested change. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseUpdate {
    /// Target status.
    #[serde(default)]
    pub status: Option<CaseStatus>,
    /// Decision; without `status` it implies `Resolved`.
    #[serde(default)]
    pub decision: Option<CaseDecision>,
    /// Analyst to assign; applies whether or not the status changes.
    #[serde(default)]
    pub analyst_id: Option<AnalystId>,
}

impl CaseUpdate {
    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.decision.is_none() && self.analyst_id.is_none()
    }
}

// ── The Case ───────────────────────────────────────────────────────────

/// All findings raised against one transaction, under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier.
    pub id: CaseId,
    /// The transaction; unique across cases.
    pub transaction_id: TransactionId,
    /// Client of the transaction.
    pub client_id: ClientId,
    /// Account of the transaction.
    pub account_id: AccountId,
    /// Review status.
    pub status: CaseStatus,
    /// Set exactly when `status` is `Resolved`.
    pub decision: Option<CaseDecision>,
    /// Responsible analyst.
    pub analyst_id: Option<AnalystId>,
    /// Maximum severity over the case's findings.
    pub severity: Severity,
    /// Creation time.
    pub opened_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// Set exactly when `status` is `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Status changes, oldest first.
    #[serde(default)]
    pub transitions: Vec<CaseTransition>,
    /// Lifecycle revision. Each stored lifecycle change increments it;
    /// attaching findings does not. Stores reject a lifecycle write whose
    /// revision no longer matches.
    #[serde(default)]
    pub version: u32,
}

impl Case {
    /// A `New` case for `tx`.
    pub fn open(tx: &Transaction, severity: Severity, now: DateTime<Utc>) -> Self {
        Self {
            id: CaseId::new(),
            transaction_id: tx.id,
            client_id: tx.client_id,
            account_id: tx.account_id,
            status: CaseStatus::New,
            decision: None,
            analyst_id: None,
            severity,
            opened_at: now,
            updated_at: now,
            resolved_at: None,
            transitions: Vec::new(),
            version: 0,
        }
    }

    /// Raise severity to `severity` if it is higher. Returns whether it
    /// changed. Severity never decreases.
    pub fn raise_severity(&mut self, severity: Severity, now: DateTime<Utc>) -> bool {
        if severity <= self.severity {
            return false;
        }
        self.severity = severity;
        self.updated_at = now;
        true
    }

    /// Assign or reassign the responsible analyst.
    ///
    /// A `New` case moves to `UnderReview`; an `UnderReview` case keeps its
    /// status.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] on a resolved case.
    pub fn assign_analyst(
        &mut self,
        analyst_id: AnalystId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CaseEventKind>, LifecycleError> {
        if self.status == CaseStatus::Resolved {
            return Err(LifecycleError::InvalidTransition {
                from: CaseStatus::Resolved,
                to: CaseStatus::UnderReview,
                reason: "cannot assign an analyst to a resolved case".into(),
            });
        }
        let mut events = Vec::new();
        if self.analyst_id != Some(analyst_id) {
            self.analyst_id = Some(analyst_id);
            self.updated_at = now;
            events.push(CaseEventKind::Assigned { analyst_id });
        }
        if self.status == CaseStatus::New {
            events.push(self.move_to(CaseStatus::UnderReview, None, now));
        }
        Ok(events)
    }

    /// Apply a reviewer's update.
    ///
    /// - New → UnderReview needs an analyst, already set or supplied.
    ///   Supplying an analyst to a `New` case implies `UnderReview`.
    /// - UnderReview → Resolved needs a decision and stamps `resolved_at`.
    /// - New → Resolved passes through UnderReview; the analyst is checked
    ///   before the decision.
    /// - Resolved → UnderReview reopens, clearing decision and `resolved_at`.
    /// - A decision without a status means `Resolved`.
    /// - Requesting the current status is a no-op, except that an already
    ///   resolved case cannot be resolved again.
    ///
    /// Two requests some clients treat as no-ops are rejected with
    /// [`LifecycleError::InvalidTransition`]:
    ///
    /// - a decision with no status on a case that is already `Resolved`;
    /// - a decision sent together with `status = UnderReview` (or `New`).
    ///
    /// Returns the events to publish, in order.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::MissingAnalyst`], [`LifecycleError::MissingDecision`]
    /// or [`LifecycleError::InvalidTransition`]; the case is unchanged.
    pub fn apply_update(
        &mut self,
        update: &CaseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Vec<CaseEventKind>, LifecycleError> {
        let from = self.status;
        let target = match (update.status, update.decision) {
            (Some(status), _) => status,
            (None, Some(_)) => CaseStatus::Resolved,
            (None, None) if from == CaseStatus::New && update.analyst_id.is_some() => {
                CaseStatus::UnderReview
            }
            (None, None) => from,
        };
        let invalid = |reason: &str| LifecycleError::InvalidTransition {
            from,
            to: target,
            reason: reason.to_string(),
        };

        if update.decision.is_some() && target != CaseStatus::Resolved {
            return Err(invalid("a decision can only accompany resolution"));
        }

        let mut next = self.clone();
        let mut events = Vec::new();

        if let Some(analyst_id) = update.analyst_id {
            if from == CaseStatus::Resolved && target != CaseStatus::UnderReview {
                return Err(invalid(
                    "a resolved case must be reopened before changing its analyst",
                ));
            }
            if next.analyst_id != Some(analyst_id) {
                next.analyst_id = Some(analyst_id);
                next.updated_at = now;
                events.push(CaseEventKind::Assigned { analyst_id });
            }
        }

        match (from, target) {
            (CaseStatus::New, CaseStatus::New) => {
                if update.analyst_id.is_some() {
                    return Err(invalid("assigning an analyst moves the case to UnderReview"));
                }
            }
            (CaseStatus::UnderReview, CaseStatus::UnderReview) => {}
            (CaseStatus::Resolved, CaseStatus::Resolved) => {
                if update.status.is_some() || update.decision.is_some() {
                    return Err(invalid("case is already resolved"));
                }
            }
            (_, CaseStatus::New) => {
                return Err(invalid("a case cannot return to New"));
            }
            (CaseStatus::New, CaseStatus::UnderReview) => {
                if next.analyst_id.is_none() {
                    return Err(LifecycleError::MissingAnalyst);
                }
                events.push(next.move_to(CaseStatus::UnderReview, None, now));
            }
            (CaseStatus::New, CaseStatus::Resolved) => {
                if next.analyst_id.is_none() {
                    return Err(LifecycleError::MissingAnalyst);
                }
                let decision = update.decision.ok_or(LifecycleError::MissingDecision)?;
                events.push(next.move_to(CaseStatus::UnderReview, None, now));
                events.push(next.move_to(CaseStatus::Resolved, Some(decision), now));
            }
            (CaseStatus::UnderReview, CaseStatus::Resolved) => {
                let decision = update.decision.ok_or(LifecycleError::MissingDecision)?;
                events.push(next.move_to(CaseStatus::Resolved, Some(decision), now));
            }
            (CaseStatus::Resolved, CaseStatus::UnderReview) => {
                events.push(next.move_to(CaseStatus::UnderReview, None, now));
            }
        }

        *self = next;
        Ok(events)
    }

    /// Change status unconditionally and log the transition. Callers have
    /// already validated it.
    fn move_to(
        &mut self,
        to: CaseStatus,
        decision: Option<CaseDecision>,
        now: DateTime<Utc>,
    ) -> CaseEventKind {
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        match to {
            CaseStatus::Resolved => {
                self.decision = decision;
                self.resolved_at = Some(now);
            }
            CaseStatus::New | CaseStatus::UnderReview => {
                self.decision = None;
                self.resolved_at = None;
            }
        }
        self.transitions.push(CaseTransition {
            from_status: from,
            to_status: to,
            at: now,
            analyst_id: self.analyst_id,
            decision,
        });
        CaseEventKind::StatusChanged { from, to, decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use tcm_core::TransactionType;

    fn new_case() -> Case {
        let tx = Transaction::new(
            ClientId::new(),
            AccountId::new(),
            TransactionType::Deposit,
            dec!(10),
            "BRL",
            dec!(10),
            "BRL",
            Utc::now(),
        )
        .unwrap();
        Case::open(&tx, Severity::Medium, Utc::now())
    }

    fn under_review() -> Case {
        let mut case = new_case();
        case.assign_analyst(AnalystId::new(), Utc::now()).unwrap();
        case
    }

    fn resolved() -> Case {
        let mut case = under_review();
        case.apply_update(
            &CaseUpdate {
                decision: Some(CaseDecision::Fraudulent),
                ..CaseUpdate::default()
            },
            Utc::now(),
        )
        .unwrap();
        case
    }

    // ── assign_analyst ─────────────────────────────────────────────────

    #[test]
    fn assign_moves_new_to_under_review() {
        let mut case = new_case();
        let analyst = AnalystId::new();
        let events = case.assign_analyst(analyst, Utc::now()).unwrap();
        assert_eq!(case.status, CaseStatus::UnderReview);
        assert_eq!(case.analyst_id, Some(analyst));
        assert_eq!(events.len(), 2);
        assert_eq!(case.transitions.len(), 1);
        assert_eq!(case.transitions[0].analyst_id, Some(analyst));
    }

    #[test]
    fn assign_reassigns_under_review() {
        let mut case = under_review();
        let other = AnalystId::new();
        let events = case.assign_analyst(other, Utc::now()).unwrap();
        assert_eq!(case.status, CaseStatus::UnderReview);
        assert_eq!(case.analyst_id, Some(other));
        assert_eq!(events, vec![CaseEventKind::Assigned { analyst_id: other }]);
    }

    #[test]
    fn assign_to_resolved_is_invalid() {
        let mut case = resolved();
        let before = case.clone();
        let err = case.assign_analyst(AnalystId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { from: CaseStatus::Resolved, .. }));
        assert_eq!(case, before);
    }

    // ── apply_update ───────────────────────────────────────────────────

    #[test]
    fn decision_on_new_without_analyst_is_missing_analyst() {
        let mut case = new_case();
        let before = case.clone();
        let err = case
            .apply_update(
                &CaseUpdate {
                    decision: Some(CaseDecision::Fraudulent),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LifecycleError::MissingAnalyst);
        assert_eq!(case, before);
    }

    #[test]
    fn new_to_under_review_without_analyst_fails() {
        let mut case = new_case();
        let err = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::UnderReview),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LifecycleError::MissingAnalyst);
    }

    #[test]
    fn new_resolved_with_analyst_and_decision_passes_through_review() {
        let mut case = new_case();
        let analyst = AnalystId::new();
        case.apply_update(
            &CaseUpdate {
                status: Some(CaseStatus::Resolved),
                decision: Some(CaseDecision::NotFraudulent),
                analyst_id: Some(analyst),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(case.status, CaseStatus::Resolved);
        assert_eq!(case.decision, Some(CaseDecision::NotFraudulent));
        assert!(case.resolved_at.is_some());
        let path: Vec<_> = case.transitions.iter().map(|t| t.to_status).collect();
        assert_eq!(path, vec![CaseStatus::UnderReview, CaseStatus::Resolved]);
    }

    #[test]
    fn new_resolved_with_analyst_but_no_decision_is_missing_decision() {
        let mut case = new_case();
        let err = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::Resolved),
                    analyst_id: Some(AnalystId::new()),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LifecycleError::MissingDecision);
        assert_eq!(case.status, CaseStatus::New);
        assert!(case.analyst_id.is_none());
    }

    #[test]
    fn analyst_only_on_new_starts_review() {
        let mut case = new_case();
        case.apply_update(
            &CaseUpdate {
                analyst_id: Some(AnalystId::new()),
                ..CaseUpdate::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(case.status, CaseStatus::UnderReview);
    }

    #[test]
    fn resolve_requires_decision() {
        let mut case = under_review();
        let err = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::Resolved),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LifecycleError::MissingDecision);
    }

    #[test]
    fn under_review_to_new_is_invalid() {
        let mut case = under_review();
        let err = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::New),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: CaseStatus::UnderReview,
                to: CaseStatus::New,
                ..
            }
        ));
    }

    #[test]
    fn reopen_clears_decision_and_resolution_time() {
        let mut case = resolved();
        let events = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::UnderReview),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(case.status, CaseStatus::UnderReview);
        assert!(case.decision.is_none());
        assert!(case.resolved_at.is_none());
        assert_eq!(
            events,
            vec![CaseEventKind::StatusChanged {
                from: CaseStatus::Resolved,
                to: CaseStatus::UnderReview,
                decision: None,
            }]
        );
    }

    #[test]
    fn reopen_may_change_analyst() {
        let mut case = resolved();
        let other = AnalystId::new();
        case.apply_update(
            &CaseUpdate {
                status: Some(CaseStatus::UnderReview),
                analyst_id: Some(other),
                ..CaseUpdate::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(case.analyst_id, Some(other));
    }

    #[test]
    fn analyst_change_on_resolved_without_reopen_is_invalid() {
        let mut case = resolved();
        let err = case
            .apply_update(
                &CaseUpdate {
                    analyst_id: Some(AnalystId::new()),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn resolving_twice_is_invalid() {
        let mut case = resolved();
        let err = case
            .apply_update(
                &CaseUpdate {
                    decision: Some(CaseDecision::Inconclusive),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: CaseStatus::Resolved,
                to: CaseStatus::Resolved,
                ..
            }
        ));
        assert_eq!(case.decision, Some(CaseDecision::Fraudulent));
    }

    #[test]
    fn decision_with_non_resolved_target_is_invalid() {
        let mut case = under_review();
        let err = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::UnderReview),
                    decision: Some(CaseDecision::Fraudulent),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn same_state_requests_are_no_ops() {
        let mut case = under_review();
        let before = case.clone();
        let events = case
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::UnderReview),
                    ..CaseUpdate::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(case, before);

        let mut fresh = new_case();
        let before = fresh.clone();
        assert!(fresh
            .apply_update(
                &CaseUpdate {
                    status: Some(CaseStatus::New),
                    ..CaseUpdate::default()
                },
                Utc::now()
            )
            .unwrap()
            .is_empty());
        assert_eq!(fresh, before);
    }

    #[test]
    fn empty_update_on_resolved_is_a_no_op() {
        let mut case = resolved();
        assert!(case.apply_update(&CaseUpdate::default(), Utc::now()).unwrap().is_empty());
        assert_eq!(case.status, CaseStatus::Resolved);
    }

    #[test]
    fn raise_severity_never_lowers() {
        let mut case = new_case();
        assert!(case.raise_severity(Severity::Critical, Utc::now()));
        assert!(!case.raise_severity(Severity::Low, Utc::now()));
        assert_eq!(case.severity, Severity::Critical);
    }

    // ── Properties ─────────────────────────────────────────────────────

    fn update() -> impl Strategy<Value = CaseUpdate> {
        let status = prop_oneof![
            Just(None),
            Just(Some(CaseStatus::New)),
            Just(Some(CaseStatus::UnderReview)),
            Just(Some(CaseStatus::Resolved)),
        ];
        let decision = prop_oneof![
            Just(None),
            Just(Some(CaseDecision::Fraudulent)),
            Just(Some(CaseDecision::NotFraudulent)),
            Just(Some(CaseDecision::Inconclusive)),
        ];
        let analyst = prop_oneof![Just(None), Just(Some(AnalystId::new()))];
        (status, decision, analyst).prop_map(|(status, decision, analyst_id)| CaseUpdate {
            status,
            decision,
            analyst_id,
        })
    }

    proptest! {
        /// Whatever sequence of updates is applied, the case stays consistent
        /// and a rejected update changes nothing.
        #[test]
        fn lifecycle_invariants_hold(updates in prop::collection::vec(update(), 1..24)) {
            let mut case = new_case();
            for u in &updates {
                let before = case.clone();
                if case.apply_update(u, Utc::now()).is_err() {
                    prop_assert_eq!(&case, &before);
                }
                prop_assert_eq!(case.status == CaseStatus::Resolved, case.decision.is_some());
                prop_assert_eq!(case.status == CaseStatus::Resolved, case.resolved_at.is_some());
                if case.status != CaseStatus::New {
                    prop_assert!(case.analyst_id.is_some());
                }
                prop_assert!(case.transitions.iter().all(|t| t.to_status != CaseStatus::New));
            }
        }
    }
}
