//! Case and finding persistence.
//!
//! Severity is stored as [`Severity::rank`] so the store can raise it with
//! `GREATEST` in the same transaction that inserts findings. Lifecycle
//! updates never write `severity_rank`; they are conditional on the
//! lifecycle `version` the caller read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use tcm_cases::{Case, CaseDecision, CaseFinding, CaseStatus, CaseTransition, Evidence};
use tcm_core::{
    AccountId, AnalystId, CaseId, ClientId, FindingId, RuleId, Severity, TransactionId,
};
use tcm_engine::{
    AppendOutcome, CasePage, CaseQuery, CaseStore, CreateOutcome, StoreError, UpdateOutcome,
};
use tcm_rules::RuleType;

use crate::error::{corrupt, store_error};
use crate::PgStore;

const CASE_COLUMNS: &str = "id, transaction_id, client_id, account_id, status, decision, \
     analyst_id, severity_rank, opened_at, updated_at, resolved_at, transitions, version";

const FILTER: &str = "($1::text IS NULL OR status = $1)
       AND ($2::smallint IS NULL OR severity_rank >= $2)
       AND ($3::uuid IS NULL OR analyst_id = $3)
       AND ($4::uuid IS NULL OR client_id = $4)";

#[async_trait]
impl CaseStore for PgStore {
    async fn try_create(
        &self,
        case: &Case,
        findings: &[CaseFinding],
    ) -> Result<CreateOutcome, StoreError> {
        let transitions = serde_json::to_value(&case.transitions)
            .map_err(|e| corrupt("case", case.id, e))?;

        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("try_create", e))?;

        let inserted = sqlx::query(
            "INSERT INTO cases (id, transaction_id, client_id, account_id, status, decision,
                 analyst_id, severity_rank, opened_at, updated_at, resolved_at, transitions, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (transaction_id) DO NOTHING",
        )
        .bind(case.id.as_uuid())
        .bind(case.transaction_id.as_uuid())
        .bind(case.client_id.as_uuid())
        .bind(case.account_id.as_uuid())
        .bind(case.status.as_str())
        .bind(case.decision.map(|d| d.as_str()))
        .bind(case.analyst_id.map(|a| *a.as_uuid()))
        .bind(case.severity.rank())
        .bind(case.opened_at)
        .bind(case.updated_at)
        .bind(case.resolved_at)
        .bind(&transitions)
        .bind(i64::from(case.version))
        .execute(&mut *db)
        .await
        .map_err(|e| store_error("try_create", e))?;

        if inserted.rows_affected() == 0 {
            db.rollback()
                .await
                .map_err(|e| store_error("try_create", e))?;
            let existing: Uuid =
                sqlx::query_scalar("SELECT id FROM cases WHERE transaction_id = $1")
                    .bind(case.transaction_id.as_uuid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| store_error("try_create", e))?;
            return Ok(CreateOutcome::Exists(CaseId::from_uuid(existing)));
        }

        insert_findings(&mut db, case.id, findings).await?;
        db.commit().await.map_err(|e| store_error("try_create", e))?;
        Ok(CreateOutcome::Created(case.id))
    }

    async fn append_findings(
        &self,
        case_id: CaseId,
        findings: &[CaseFinding],
    ) -> Result<AppendOutcome, StoreError> {
        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("append_findings", e))?;

        let locked: Option<i16> =
            sqlx::query_scalar("SELECT severity_rank FROM cases WHERE id = $1 FOR UPDATE")
                .bind(case_id.as_uuid())
                .fetch_optional(&mut *db)
                .await
                .map_err(|e| store_error("append_findings", e))?;
        if locked.is_none() {
            return Err(StoreError::Corrupt(format!("case {case_id} does not exist")));
        }

        let inserted = insert_findings(&mut db, case_id, findings).await?;

        let rank: i16 = sqlx::query_scalar(
            "UPDATE cases SET
                 severity_rank = GREATEST(cases.severity_rank, m.max_rank),
                 updated_at = CASE WHEN m.max_rank > cases.severity_rank THEN $2 ELSE cases.updated_at END
             FROM (SELECT COALESCE(MAX(severity_rank), 0)::smallint AS max_rank
                   FROM case_findings WHERE case_id = $1) m
             WHERE cases.id = $1
             RETURNING cases.severity_rank",
        )
        .bind(case_id.as_uuid())
        .bind(Utc::now())
        .fetch_one(&mut *db)
        .await
        .map_err(|e| store_error("append_findings", e))?;

        db.commit()
            .await
            .map_err(|e| store_error("append_findings", e))?;

        let severity = Severity::from_rank(rank)
            .ok_or_else(|| corrupt("case", case_id, format!("severity rank {rank}")))?;
        Ok(AppendOutcome { inserted, severity })
    }

    async fn update(&self, case: &Case) -> Result<UpdateOutcome, StoreError> {
        let transitions = serde_json::to_value(&case.transitions)
            .map_err(|e| corrupt("case", case.id, e))?;
        let result = sqlx::query(
            "UPDATE cases SET status = $1, decision = $2, analyst_id = $3,
                 resolved_at = $4, updated_at = $5, transitions = $6, version = version + 1
             WHERE id = $7 AND version = $8",
        )
        .bind(case.status.as_str())
        .bind(case.decision.map(|d| d.as_str()))
        .bind(case.analyst_id.map(|a| *a.as_uuid()))
        .bind(case.resolved_at)
        .bind(case.updated_at)
        .bind(&transitions)
        .bind(case.id.as_uuid())
        .bind(i64::from(case.version))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("update", e))?;
        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Updated);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cases WHERE id = $1)")
            .bind(case.id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("update", e))?;
        Ok(if exists {
            UpdateOutcome::Conflict
        } else {
            UpdateOutcome::NotFound
        })
    }

    async fn get(&self, id: CaseId) -> Result<Option<Case>, StoreError> {
        let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = $1");
        sqlx::query_as::<_, CaseRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get", e))?
            .map(CaseRow::into_case)
            .transpose()
    }

    async fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Case>, StoreError> {
        let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE transaction_id = $1");
        sqlx::query_as::<_, CaseRow>(&sql)
            .bind(transaction_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("find_by_transaction", e))?
            .map(CaseRow::into_case)
            .transpose()
    }

    async fn findings(&self, case_id: CaseId) -> Result<Vec<CaseFinding>, StoreError> {
        let rows = sqlx::query_as::<_, FindingRow>(
            "SELECT id, case_id, rule_id, rule_code, rule_type, severity_rank, evidence,
                    fingerprint, created_at
             FROM case_findings WHERE case_id = $1 ORDER BY created_at, id",
        )
        .bind(case_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("findings", e))?;
        rows.into_iter().map(FindingRow::into_finding).collect()
    }

    async fn list(&self, query: &CaseQuery) -> Result<CasePage, StoreError> {
        let query = query.normalized();
        let status = query.status.map(|s| s.as_str());
        let min_rank = query.min_severity.map(|s| s.rank());
        let analyst = query.analyst_id.map(|a| *a.as_uuid());
        let client = query.client_id.map(|c| *c.as_uuid());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM cases WHERE {FILTER}"))
            .bind(status)
            .bind(min_rank)
            .bind(analyst)
            .bind(client)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("list", e))?;

        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases WHERE {FILTER}
             ORDER BY opened_at DESC, id DESC LIMIT $5 OFFSET $6"
        );
        let rows = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(status)
            .bind(min_rank)
            .bind(analyst)
            .bind(client)
            .bind(i64::from(query.page_size))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list", e))?;

        Ok(CasePage {
            items: rows
                .into_iter()
                .map(CaseRow::into_case)
                .collect::<Result<_, _>>()?,
            total: u64::try_from(total).unwrap_or(0),
            page: query.page,
            page_size: query.page_size,
        })
    }
}

/// Insert findings under `case_id`, skipping known fingerprints. Returns
/// how many rows were inserted.
async fn insert_findings(
    db: &mut DbTransaction<'_, Postgres>,
    case_id: CaseId,
    findings: &[CaseFinding],
) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for finding in findings {
        let evidence = serde_json::to_value(&finding.evidence)
            .map_err(|e| corrupt("finding", finding.id, e))?;
        let result = sqlx::query(
            "INSERT INTO case_findings (id, case_id, rule_id, rule_code, rule_type, severity_rank,
                 evidence, fingerprint, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (case_id, fingerprint) DO NOTHING",
        )
        .bind(finding.id.as_uuid())
        .bind(case_id.as_uuid())
        .bind(finding.rule_id.as_uuid())
        .bind(&finding.rule_code)
        .bind(finding.rule_type.as_str())
        .bind(finding.severity.rank())
        .bind(&evidence)
        .bind(&finding.fingerprint)
        .bind(finding.created_at)
        .execute(&mut **db)
        .await
        .map_err(|e| store_error("insert_findings", e))?;
        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }
    Ok(inserted)
}

// ── Rows ───────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct CaseRow {
    id: Uuid,
    transaction_id: Uuid,
    client_id: Uuid,
    account_id: Uuid,
    status: String,
    decision: Option<String>,
    analyst_id: Option<Uuid>,
    severity_rank: i16,
    opened_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    transitions: serde_json::Value,
    version: i64,
}

impl CaseRow {
    fn into_case(self) -> Result<Case, StoreError> {
        let id = self.id;
        let status: CaseStatus = self
            .status
            .parse()
            .map_err(|e: String| corrupt("case", id, e))?;
        let decision = self
            .decision
            .map(|d| d.parse::<CaseDecision>())
            .transpose()
            .map_err(|e| corrupt("case", id, e))?;
        let severity = Severity::from_rank(self.severity_rank)
            .ok_or_else(|| corrupt("case", id, format!("severity rank {}", self.severity_rank)))?;
        let transitions: Vec<CaseTransition> =
            serde_json::from_value(self.transitions).map_err(|e| corrupt("case", id, e))?;
        let version = u32::try_from(self.version).map_err(|e| corrupt("case", id, e))?;

        Ok(Case {
            id: CaseId::from_uuid(id),
            transaction_id: TransactionId::from_uuid(self.transaction_id),
            client_id: ClientId::from_uuid(self.client_id),
            account_id: AccountId::from_uuid(self.account_id),
            status,
            decision,
            analyst_id: self.analyst_id.map(AnalystId::from_uuid),
            severity,
            opened_at: self.opened_at,
            updated_at: self.updated_at,
            resolved_at: self.resolved_at,
            transitions,
            version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FindingRow {
    id: Uuid,
    case_id: Uuid,
    rule_id: Uuid,
    rule_code: String,
    rule_type: String,
    severity_rank: i16,
    evidence: serde_json::Value,
    fingerprint: String,
    created_at: DateTime<Utc>,
}

impl FindingRow {
    fn into_finding(self) -> Result<CaseFinding, StoreError> {
        let id = self.id;
        let rule_type: RuleType = self
            .rule_type
            .parse()
            .map_err(|e: String| corrupt("finding", id, e))?;
        let severity = Severity::from_rank(self.severity_rank)
            .ok_or_else(|| corrupt("finding", id, format!("severity rank {}", self.severity_rank)))?;
        let evidence: Evidence =
            serde_json::from_value(self.evidence).map_err(|e| corrupt("finding", id, e))?;

        Ok(CaseFinding {
            id: FindingId::from_uuid(id),
            case_id: CaseId::from_uuid(self.case_id),
            rule_id: RuleId::from_uuid(self.rule_id),
            rule_code: self.rule_code,
            rule_type,
            severity,
            evidence,
            fingerprint: self.fingerprint,
            created_at: self.created_at,
        })
    }
}
