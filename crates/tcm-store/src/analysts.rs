//! Analyst lookups.

use async_trait::async_trait;

use tcm_core::AnalystId;
use tcm_engine::{AnalystDirectory, StoreError};

use crate::error::store_error;
use crate::PgStore;

impl PgStore {
    /// Register an analyst. Returns `false` when the id is already known.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on database failure.
    pub async fn insert_analyst(&self, analyst_id: AnalystId, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO analysts (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(analyst_id.as_uuid())
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("insert_analyst", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AnalystDirectory for PgStore {
    async fn exists(&self, analyst_id: AnalystId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM analysts WHERE id = $1 AND is_active)")
            .bind(analyst_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("analyst_exists", e))
    }
}
