//! Wiring shared by the subcommands.

use anyhow::{Context, Result};

use tcm_engine::EngineConfig;
use tcm_store::{init_pool, PgStore};

/// Load configuration from the environment.
pub fn config() -> Result<EngineConfig> {
    EngineConfig::from_env().context("reading engine configuration")
}

/// Connect to PostgreSQL, or `None` when no `DATABASE_URL` is configured.
pub async fn optional_store(config: &EngineConfig) -> Result<Option<PgStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set, using in-memory adapters");
        return Ok(None);
    };
    let connections = u32::try_from(config.bulk_concurrency)
        .unwrap_or(u32::MAX)
        .saturating_add(2);
    let pool = init_pool(url, connections)
        .await
        .context("connecting to PostgreSQL")?;
    Ok(Some(PgStore::new(pool)))
}

/// Connect to PostgreSQL; the command needs persistent state.
pub async fn require_store(config: &EngineConfig) -> Result<PgStore> {
    optional_store(config)
        .await?
        .context("this command needs DATABASE_URL to point at the case database")
}
