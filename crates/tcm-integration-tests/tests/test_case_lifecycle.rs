//! Reviewer workflow on cases opened by the checker.

mod common;

use serde_json::json;

use common::{rule, transfer, Engine};
use tcm_cases::{CaseDecision, CaseEventKind, CaseStatus, CaseUpdate, LifecycleError};
use tcm_core::{AnalystId, CaseId, ClientId, Severity};
use tcm_engine::{CaseQuery, EngineError};
use tcm_rules::RuleType;

async fn engine_with_case() -> (Engine, CaseId) {
    let engine = Engine::new(vec![rule(
        "BC",
        RuleType::BannedCountries,
        Severity::High,
        None,
        json!({ "countries": ["IR"] }),
    )])
    .await;
    let case_id = engine
        .record_and_check(&transfer(ClientId::new(), "IR", None))
        .await
        .unwrap()
        .case_id()
        .unwrap();
    (engine, case_id)
}

fn lifecycle(err: EngineError) -> LifecycleError {
    match err {
        EngineError::Lifecycle(e) => e,
        other => panic!("expected a lifecycle error, got {other:?}"),
    }
}

#[tokio::test]
async fn resolving_a_new_case_needs_an_analyst() {
    let (engine, case_id) = engine_with_case().await;
    let err = engine
        .review
        .update(
            case_id,
            CaseUpdate {
                decision: Some(CaseDecision::Fraudulent),
                ..CaseUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(lifecycle(err), LifecycleError::MissingAnalyst);

    let case = engine.review.get(case_id).await.unwrap();
    assert_eq!(case.status, CaseStatus::New);
    assert!(case.transitions.is_empty());
}

#[tokio::test]
async fn unknown_analyst_is_rejected() {
    let (engine, case_id) = engine_with_case().await;
    let stranger = AnalystId::new();
    let err = engine
        .review
        .assign_to_analyst(case_id, stranger)
        .await
        .unwrap_err();
    assert_eq!(lifecycle(err), LifecycleError::AnalystNotFound(stranger));
}

#[tokio::test]
async fn missing_case_wins_over_unknown_analyst() {
    let (engine, _) = engine_with_case().await;
    let missing = CaseId::new();
    let err = engine
        .review
        .assign_to_analyst(missing, AnalystId::new())
        .await
        .unwrap_err();
    assert_eq!(lifecycle(err), LifecycleError::NotFound(missing));
}

#[tokio::test]
async fn full_review_cycle() {
    let (engine, case_id) = engine_with_case().await;
    let analyst = AnalystId::new();
    engine.analysts.add(analyst);

    let assigned = engine.review.assign_to_analyst(case_id, analyst).await.unwrap();
    assert_eq!(assigned.status, CaseStatus::UnderReview);
    assert_eq!(assigned.analyst_id, Some(analyst));

    // Back to New is never allowed.
    let err = engine
        .review
        .update(
            case_id,
            CaseUpdate {
                status: Some(CaseStatus::New),
                ..CaseUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        lifecycle(err),
        LifecycleError::InvalidTransition {
            from: CaseStatus::UnderReview,
            to: CaseStatus::New,
            ..
        }
    ));

    let err = engine
        .review
        .update(
            case_id,
            CaseUpdate {
                status: Some(CaseStatus::Resolved),
                ..CaseUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(lifecycle(err), LifecycleError::MissingDecision);

    let resolved = engine
        .review
        .update(
            case_id,
            CaseUpdate {
                decision: Some(CaseDecision::NotFraudulent),
                ..CaseUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, CaseStatus::Resolved);
    assert_eq!(resolved.decision, Some(CaseDecision::NotFraudulent));
    assert!(resolved.resolved_at.is_some());

    let reopened = engine
        .review
        .update(
            case_id,
            CaseUpdate {
                status: Some(CaseStatus::UnderReview),
                ..CaseUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reopened.status, CaseStatus::UnderReview);
    assert_eq!(reopened.decision, None);
    assert_eq!(reopened.resolved_at, None);
    assert_eq!(reopened.analyst_id, Some(analyst));
    assert_eq!(reopened.transitions.len(), 3);

    let stored = engine.review.get(case_id).await.unwrap();
    assert_eq!(stored, reopened);

    let kinds: Vec<CaseEventKind> = engine
        .publisher
        .events()
        .into_iter()
        .filter(|(id, _)| *id == case_id)
        .map(|(_, kind)| kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            CaseEventKind::Opened { severity: Severity::High },
            CaseEventKind::Assigned { analyst_id: analyst },
            CaseEventKind::StatusChanged {
                from: CaseStatus::New,
                to: CaseStatus::UnderReview,
                decision: None,
            },
            CaseEventKind::StatusChanged {
                from: CaseStatus::UnderReview,
                to: CaseStatus::Resolved,
                decision: Some(CaseDecision::NotFraudulent),
            },
            CaseEventKind::StatusChanged {
                from: CaseStatus::Resolved,
                to: CaseStatus::UnderReview,
                decision: None,
            },
        ]
    );
}

#[tokio::test]
async fn new_case_can_be_resolved_in_one_step_with_an_analyst() {
    let (engine, case_id) = engine_with_case().await;
    let analyst = AnalystId::new();
    engine.analysts.add(analyst);

    let resolved = engine
        .review
        .update(
            case_id,
            CaseUpdate {
                decision: Some(CaseDecision::Inconclusive),
                analyst_id: Some(analyst),
                ..CaseUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, CaseStatus::Resolved);
    let path: Vec<_> = resolved
        .transitions
        .iter()
        .map(|t| (t.from_status, t.to_status))
        .collect();
    assert_eq!(
        path,
        vec![
            (CaseStatus::New, CaseStatus::UnderReview),
            (CaseStatus::UnderReview, CaseStatus::Resolved),
        ]
    );
}

#[tokio::test]
async fn review_does_not_touch_severity() {
    let (engine, case_id) = engine_with_case().await;
    let analyst = AnalystId::new();
    engine.analysts.add(analyst);
    let case = engine.review.assign_to_analyst(case_id, analyst).await.unwrap();
    assert_eq!(case.severity, Severity::High);
    assert_eq!(engine.review.findings(case_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn listing_filters_by_status_and_analyst() {
    let engine = Engine::new(vec![rule(
        "BC",
        RuleType::BannedCountries,
        Severity::Medium,
        None,
        json!({ "countries": ["IR"] }),
    )])
    .await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        let outcome = engine
            .record_and_check(&transfer(ClientId::new(), "IR", None))
            .await
            .unwrap();
        ids.push(outcome.case_id().unwrap());
    }
    let analyst = AnalystId::new();
    engine.analysts.add(analyst);
    engine.review.assign_to_analyst(ids[1], analyst).await.unwrap();

    let new_cases = engine
        .review
        .list(&CaseQuery {
            status: Some(CaseStatus::New),
            ..CaseQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(new_cases.total, 2);
    assert!(new_cases.items.iter().all(|c| c.status == CaseStatus::New));

    let mine = engine
        .review
        .list(&CaseQuery {
            analyst_id: Some(analyst),
            ..CaseQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].id, ids[1]);

    let none = engine
        .review
        .list(&CaseQuery {
            min_severity: Some(Severity::High),
            ..CaseQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(none.total, 0);
}
