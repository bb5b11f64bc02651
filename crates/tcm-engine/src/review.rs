//! # Case Review
//!
//! The reviewer-facing side of the engine: assignment, status and decision
//! updates, and case queries. Lifecycle rules live on [`Case`]; this service
//! loads the case, applies the change, persists it and publishes the
//! resulting events. A rejected request writes nothing.
//!
//! Writes are conditional on the case's lifecycle version. When another
//! reviewer got there first the service reloads the case and applies the
//! request once more against the newer state; a second collision surfaces
//! as [`LifecycleError::Conflict`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use tcm_cases::{Case, CaseEventKind, CaseFinding, CaseUpdate, LifecycleError};
use tcm_core::{AnalystId, CaseId};

use crate::deadline::within;
use crate::error::EngineError;
use crate::notify::publish_best_effort;
use crate::ports::{
    AnalystDirectory, CasePage, CaseQuery, CaseStore, NotificationPublisher, UpdateOutcome,
};

/// Loads of a case per request before giving up on a concurrent writer.
const UPDATE_ATTEMPTS: u32 = 2;

/// Reviewer operations on cases.
#[derive(Clone)]
pub struct CaseReviewService {
    store: Arc<dyn CaseStore>,
    publisher: Arc<dyn NotificationPublisher>,
    analysts: Option<Arc<dyn AnalystDirectory>>,
    store_timeout: Duration,
}

impl std::fmt::Debug for CaseReviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseReviewService")
            .field("checks_analysts", &self.analysts.is_some())
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl CaseReviewService {
    /// Service over `store`. Analyst ids are not verified until a directory
    /// is attached with [`CaseReviewService::with_analyst_directory`].
    pub fn new(
        store: Arc<dyn CaseStore>,
        publisher: Arc<dyn NotificationPublisher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            analysts: None,
            store_timeout,
        }
    }

    /// Reject analyst ids unknown to `directory`.
    pub fn with_analyst_directory(mut self, directory: Arc<dyn AnalystDirectory>) -> Self {
        self.analysts = Some(directory);
        self
    }

    /// Assign or reassign the case's analyst. A `New` case moves to
    /// `UnderReview`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`], [`LifecycleError::AnalystNotFound`], or
    /// [`LifecycleError::InvalidTransition`] on a resolved case, or
    /// [`LifecycleError::Conflict`], wrapped in [`EngineError::Lifecycle`];
    /// [`EngineError::Store`] on store failure.
    pub async fn assign_to_analyst(
        &self,
        case_id: CaseId,
        analyst_id: AnalystId,
    ) -> Result<Case, EngineError> {
        self.modify(case_id, Some(analyst_id), |case, now| {
            case.assign_analyst(analyst_id, now)
        })
        .await
    }

    /// Apply a reviewer update. See [`Case::apply_update`] for the rules.
    ///
    /// # Errors
    ///
    /// Any [`LifecycleError`], wrapped in [`EngineError::Lifecycle`];
    /// [`EngineError::Store`] on store failure.
    pub async fn update(&self, case_id: CaseId, update: CaseUpdate) -> Result<Case, EngineError> {
        self.modify(case_id, update.analyst_id, |case, now| {
            case.apply_update(&update, now)
        })
        .await
    }

    /// A case by id.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`EngineError::Store`].
    pub async fn get(&self, case_id: CaseId) -> Result<Case, EngineError> {
        within(self.store_timeout, "get", self.store.get(case_id))
            .await?
            .ok_or_else(|| LifecycleError::NotFound(case_id).into())
    }

    /// Findings of a case, oldest first.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`EngineError::Store`].
    pub async fn findings(&self, case_id: CaseId) -> Result<Vec<CaseFinding>, EngineError> {
        self.get(case_id).await?;
        Ok(within(self.store_timeout, "findings", self.store.findings(case_id)).await?)
    }

    /// Cases matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`].
    pub async fn list(&self, query: &CaseQuery) -> Result<CasePage, EngineError> {
        Ok(within(self.store_timeout, "list", self.store.list(&query.normalized())).await?)
    }

    async fn ensure_analyst(&self, analyst_id: AnalystId) -> Result<(), EngineError> {
        let Some(directory) = &self.analysts else {
            return Ok(());
        };
        if within(self.store_timeout, "analyst_exists", directory.exists(analyst_id)).await? {
            Ok(())
        } else {
            Err(LifecycleError::AnalystNotFound(analyst_id).into())
        }
    }

    // Load, change, conditionally write. `analyst` is verified once, after
    // the first load, so an unknown case wins over an unknown analyst.
    async fn modify<F>(
        &self,
        case_id: CaseId,
        analyst: Option<AnalystId>,
        change: F,
    ) -> Result<Case, EngineError>
    where
        F: Fn(&mut Case, DateTime<Utc>) -> Result<Vec<CaseEventKind>, LifecycleError>,
    {
        for attempt in 1..=UPDATE_ATTEMPTS {
            let mut case = self.get(case_id).await?;
            if attempt == 1 {
                if let Some(analyst_id) = analyst {
                    self.ensure_analyst(analyst_id).await?;
                }
            }
            let events = change(&mut case, Utc::now())?;
            if events.is_empty() {
                return Ok(case);
            }
            match within(self.store_timeout, "update", self.store.update(&case)).await? {
                UpdateOutcome::Updated => {
                    case.version += 1;
                    return Ok(self.announce(case, events).await);
                }
                UpdateOutcome::NotFound => return Err(LifecycleError::NotFound(case_id).into()),
                UpdateOutcome::Conflict => {
                    tracing::debug!(%case_id, attempt, "case changed concurrently, reloading");
                }
            }
        }
        tracing::warn!(%case_id, "giving up on a case under concurrent review");
        Err(LifecycleError::Conflict(case_id).into())
    }

    async fn announce(&self, case: Case, events: Vec<CaseEventKind>) -> Case {
        tracing::info!(
            case_id = %case.id,
            status = %case.status,
            analyst_id = ?case.analyst_id,
            decision = ?case.decision,
            "case updated"
        );
        for event in &events {
            publish_best_effort(self.publisher.as_ref(), case.id, event).await;
        }
        case
    }
}
