//! Explicit catalog refresh.
//!
//! The host calls [`CatalogRefresher::refresh_if_stale`] on its own cadence
//! (a timer, a request hook, a CLI run). A failed refresh keeps serving the
//! previous snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tcm_rules::{CatalogHandle, RuleCatalog};

use crate::deadline::within;
use crate::error::EngineError;
use crate::ports::RuleRepository;

/// Rebuilds the catalog from the rule repository.
#[derive(Clone)]
pub struct CatalogRefresher {
    rules: Arc<dyn RuleRepository>,
    handle: CatalogHandle,
    max_age: chrono::Duration,
    store_timeout: Duration,
}

impl std::fmt::Debug for CatalogRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogRefresher")
            .field("handle", &self.handle)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl CatalogRefresher {
    /// Refresher feeding `handle`, treating snapshots older than `max_age`
    /// as stale.
    pub fn new(
        rules: Arc<dyn RuleRepository>,
        handle: CatalogHandle,
        max_age: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            rules,
            handle,
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
            store_timeout,
        }
    }

    /// The handle this refresher writes.
    pub fn handle(&self) -> &CatalogHandle {
        &self.handle
    }

    /// Load active rules and swap in a new snapshot.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] when the rules cannot be read; the previous
    /// snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<RuleCatalog>, EngineError> {
        let stored = within(self.store_timeout, "active_rules", self.rules.active()).await?;
        let catalog = RuleCatalog::load(stored, Utc::now());
        tracing::info!(
            rules = catalog.len(),
            rejected = catalog.rejected().len(),
            "rule catalog refreshed"
        );
        self.handle.replace(catalog);
        Ok(self.handle.snapshot())
    }

    /// Refresh only when the current snapshot has reached `max_age`.
    /// Returns whether a refresh happened.
    ///
    /// # Errors
    ///
    /// See [`CatalogRefresher::refresh`].
    pub async fn refresh_if_stale(&self) -> Result<bool, EngineError> {
        if !self.handle.is_stale(self.max_age, Utc::now()) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryRuleRepository;
    use async_trait::async_trait;
    use serde_json::json;
    use tcm_core::{RuleId, Severity};
    use tcm_rules::{ComplianceRule, RuleType};

    fn rule(code: &str, params: serde_json::Value) -> ComplianceRule {
        ComplianceRule {
            id: RuleId::new(),
            code: code.into(),
            name: code.into(),
            rule_type: RuleType::BannedCountries,
            is_active: true,
            severity: Severity::Low,
            scope: None,
            parameters: params,
            updated_at: Utc::now(),
        }
    }

    struct Broken;

    #[async_trait]
    impl RuleRepository for Broken {
        async fn active(&self) -> Result<Vec<ComplianceRule>, StoreError> {
            Err(StoreError::Unavailable("rules table locked".into()))
        }
    }

    #[tokio::test]
    async fn refresh_swaps_snapshot_and_excludes_invalid_rules() {
        let repo = MemoryRuleRepository::new(vec![
            rule("OK", json!({ "countries": ["IR"] })),
            rule("BAD", json!({ "countries": "IR" })),
        ]);
        let handle = CatalogHandle::new(RuleCatalog::empty(Utc::now()));
        let refresher = CatalogRefresher::new(
            Arc::new(repo),
            handle.clone(),
            Duration::from_secs(300),
            Duration::from_secs(1),
        );
        let catalog = refresher.refresh().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.rejected().len(), 1);
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let handle = CatalogHandle::new(RuleCatalog::load(
            vec![rule("OK", json!({ "countries": ["IR"] }))],
            Utc::now() - chrono::Duration::hours(1),
        ));
        let refresher = CatalogRefresher::new(
            Arc::new(Broken),
            handle.clone(),
            Duration::from_secs(300),
            Duration::from_secs(1),
        );
        assert!(refresher.refresh_if_stale().await.is_err());
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn fresh_catalog_is_not_reloaded() {
        let repo = MemoryRuleRepository::new(vec![rule("OK", json!({ "countries": ["IR"] }))]);
        let handle = CatalogHandle::new(RuleCatalog::empty(Utc::now()));
        let refresher = CatalogRefresher::new(
            Arc::new(repo.clone()),
            handle.clone(),
            Duration::from_secs(300),
            Duration::from_secs(1),
        );
        assert!(!refresher.refresh_if_stale().await.unwrap());
        assert!(handle.snapshot().is_empty());
    }
}
