//! Engine configuration.
//!
//! Read from the environment with defaults. `DATABASE_URL` may carry
//! credentials, so the `Debug` implementation redacts it.

use std::time::Duration;

/// Runtime configuration for the engine and its hosts.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum catalog age before the host should refresh it.
    pub catalog_refresh: Duration,
    /// Deadline applied to every store call.
    pub store_timeout: Duration,
    /// Transactions checked concurrently by the bulk runner.
    pub bulk_concurrency: usize,
    /// PostgreSQL connection string. `None` selects in-memory adapters.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("catalog_refresh", &self.catalog_refresh)
            .field("store_timeout", &self.store_timeout)
            .field("bulk_concurrency", &self.bulk_concurrency)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_refresh: Duration::from_secs(300),
            store_timeout: Duration::from_millis(5000),
            bulk_concurrency: 8,
            database_url: None,
        }
    }
}

impl EngineConfig {
    /// Largest accepted bulk concurrency.
    pub const MAX_BULK_CONCURRENCY: usize = 1024;

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TCM_CATALOG_REFRESH_SECS` (default: 300)
    /// - `TCM_STORE_TIMEOUT_MS` (default: 5000)
    /// - `TCM_BULK_CONCURRENCY` (default: 8, at most 1024)
    /// - `DATABASE_URL` (optional)
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when a variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let refresh_secs = env_positive(&lookup, "TCM_CATALOG_REFRESH_SECS")?
            .unwrap_or(defaults.catalog_refresh.as_secs());
        let timeout_ms = match env_positive(&lookup, "TCM_STORE_TIMEOUT_MS")? {
            Some(ms) => ms,
            None => u64::try_from(defaults.store_timeout.as_millis()).unwrap_or(u64::MAX),
        };
        let concurrency = env_positive(&lookup, "TCM_BULK_CONCURRENCY")?
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(defaults.bulk_concurrency);
        if concurrency > Self::MAX_BULK_CONCURRENCY {
            return Err(ConfigError::Invalid {
                var: "TCM_BULK_CONCURRENCY",
                value: concurrency.to_string(),
                reason: "must be at most 1024",
            });
        }
        let database_url = lookup("DATABASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            catalog_refresh: Duration::from_secs(refresh_secs),
            store_timeout: Duration::from_millis(timeout_ms),
            bulk_concurrency: concurrency,
            database_url,
        })
    }
}

fn env_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "must be greater than zero",
        }),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected a positive integer",
        }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to an unusable value.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        /// Environment variable.
        var: &'static str,
        /// Value found.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.catalog_refresh, Duration::from_secs(300));
        assert_eq!(cfg.store_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.bulk_concurrency, 8);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("TCM_CATALOG_REFRESH_SECS", "60"),
            ("TCM_STORE_TIMEOUT_MS", " 250 "),
            ("TCM_BULK_CONCURRENCY", "32"),
            ("DATABASE_URL", "postgres://tcm:secret@db/tcm"),
        ]))
        .unwrap();
        assert_eq!(cfg.catalog_refresh, Duration::from_secs(60));
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));
        assert_eq!(cfg.bulk_concurrency, 32);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://tcm:secret@db/tcm"));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let err = EngineConfig::from_lookup(lookup(&[("TCM_STORE_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "TCM_STORE_TIMEOUT_MS", .. }));
        let err =
            EngineConfig::from_lookup(lookup(&[("TCM_BULK_CONCURRENCY", "many")])).unwrap_err();
        assert!(err.to_string().contains("TCM_BULK_CONCURRENCY"));
        assert!(EngineConfig::from_lookup(lookup(&[("TCM_BULK_CONCURRENCY", "5000")])).is_err());
    }

    #[test]
    fn blank_database_url_means_memory() {
        let cfg = EngineConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn debug_redacts_database_url() {
        let cfg = EngineConfig {
            database_url: Some("postgres://tcm:hunter2@db/tcm".into()),
            ..EngineConfig::default()
        };
        let debug = format!("{cfg:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
