#![deny(missing_docs)]

//! # tcm-store — PostgreSQL Persistence
//!
//! [`PgStore`] implements every `tcm-engine` port over one `sqlx` pool:
//! [`TransactionSource`](tcm_engine::TransactionSource),
//! [`RuleRepository`](tcm_engine::RuleRepository),
//! [`CaseStore`](tcm_engine::CaseStore) and
//! [`AnalystDirectory`](tcm_engine::AnalystDirectory).
//!
//! Queries are checked at runtime (`sqlx::query`), so building the crate
//! needs no database. The schema lives in `migrations/` and is applied by
//! [`init_pool`].
//!
//! ## Uniqueness
//!
//! The `cases_transaction_id_key` and `case_findings_fingerprint_key`
//! constraints are what make case creation safe under concurrency. Case
//! creation inserts with `ON CONFLICT DO NOTHING` and reports the winner's
//! id as [`CreateOutcome::Exists`](tcm_engine::CreateOutcome::Exists).

pub mod analysts;
pub mod cases;
pub mod error;
pub mod rules;
pub mod transactions;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to `database_url` and apply the embedded migrations.
///
/// # Errors
///
/// Connection or migration failure.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}

/// All engine ports over one PostgreSQL pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Store over `pool`. Migrations must already be applied.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
