//! Compliance rule persistence.
//!
//! Rules are stored as configured; parameters stay raw JSON and are only
//! validated when the catalog is built.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tcm_core::{RuleId, Severity};
use tcm_engine::{RuleRepository, StoreError};
use tcm_rules::{ComplianceRule, RuleType};

use crate::error::{corrupt, store_error};
use crate::PgStore;

impl PgStore {
    /// Insert or replace a rule, keyed by its code.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on database failure.
    pub async fn upsert_rule(&self, rule: &ComplianceRule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO compliance_rules (id, code, name, rule_type, is_active, severity, scope, parameters, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (code) DO UPDATE SET
                 name = EXCLUDED.name,
                 rule_type = EXCLUDED.rule_type,
                 is_active = EXCLUDED.is_active,
                 severity = EXCLUDED.severity,
                 scope = EXCLUDED.scope,
                 parameters = EXCLUDED.parameters,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(rule.id.as_uuid())
        .bind(&rule.code)
        .bind(&rule.name)
        .bind(rule.rule_type.as_str())
        .bind(rule.is_active)
        .bind(rule.severity.as_str())
        .bind(rule.scope.as_deref())
        .bind(&rule.parameters)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert_rule", e))?;
        Ok(())
    }
}

#[async_trait]
impl RuleRepository for PgStore {
    async fn active(&self) -> Result<Vec<ComplianceRule>, StoreError> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, code, name, rule_type, is_active, severity, scope, parameters, updated_at
             FROM compliance_rules WHERE is_active ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("active_rules", e))?;

        // A row whose type or severity is unreadable is dropped here rather
        // than failing the whole catalog.
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_rule() {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::error!(error = %e, "stored rule unreadable, skipped");
                    None
                }
            })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    code: String,
    name: String,
    rule_type: String,
    is_active: bool,
    severity: String,
    scope: Option<String>,
    parameters: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl RuleRow {
    fn into_rule(self) -> Result<ComplianceRule, StoreError> {
        let rule_type: RuleType = self
            .rule_type
            .parse()
            .map_err(|e: String| corrupt("rule", &self.code, e))?;
        let severity: Severity = self
            .severity
            .parse()
            .map_err(|e| corrupt("rule", &self.code, e))?;
        Ok(ComplianceRule {
            id: RuleId::from_uuid(self.id),
            code: self.code,
            name: self.name,
            rule_type,
            is_active: self.is_active,
            severity,
            scope: self.scope,
            parameters: self.parameters,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(rule_type: &str, severity: &str) -> RuleRow {
        RuleRow {
            id: Uuid::new_v4(),
            code: "DL-1".into(),
            name: "Daily limit".into(),
            rule_type: rule_type.into(),
            is_active: true,
            severity: severity.into(),
            scope: Some("BR".into()),
            parameters: json!({ "limitBaseAmount": 1000 }),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_decodes_case_insensitively() {
        let rule = row("dailylimit", "HIGH").into_rule().unwrap();
        assert_eq!(rule.rule_type, RuleType::DailyLimit);
        assert_eq!(rule.severity, Severity::High);
        assert_eq!(rule.scope.as_deref(), Some("BR"));
    }

    #[test]
    fn unknown_rule_type_is_corrupt() {
        let err = row("VelocityCheck", "High").into_rule().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(ref m) if m.contains("DL-1")));
    }
}
