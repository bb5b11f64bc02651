//! # Findings
//!
//! One finding per violation. A finding's fingerprint is the SHA-256 of the
//! canonical JSON of the rule id, rule type, transaction id and the
//! evidence's identity facts. Retrying a check reproduces the same
//! fingerprints, so storage can refuse duplicates with a unique constraint
//! on `(case_id, fingerprint)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use tcm_core::{CaseId, FindingId, RuleId, Severity, TransactionId};
use tcm_rules::{Evidence, RuleType, Violation};

/// An immutable record of one rule violation attached to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFinding {
    /// Finding identifier.
    pub id: FindingId,
    /// Owning case.
    pub case_id: CaseId,
    /// Rule that fired.
    pub rule_id: RuleId,
    /// Code of that rule at evaluation time.
    pub rule_code: String,
    /// Rule kind.
    pub rule_type: RuleType,
    /// Severity of the rule at evaluation time.
    pub severity: Severity,
    /// Supporting facts.
    pub evidence: Evidence,
    /// Lower-case hex SHA-256 identifying the violation.
    pub fingerprint: String,
    /// When the finding was recorded.
    pub created_at: DateTime<Utc>,
}

impl CaseFinding {
    /// Record `violation` of `transaction_id` against `case_id`.
    pub fn from_violation(
        case_id: CaseId,
        transaction_id: TransactionId,
        violation: &Violation,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: FindingId::new(),
            case_id,
            rule_id: violation.rule_id,
            rule_code: violation.rule_code.clone(),
            rule_type: violation.rule_type,
            severity: violation.severity,
            evidence: violation.evidence.clone(),
            fingerprint: fingerprint(
                violation.rule_id,
                violation.rule_type,
                transaction_id,
                &violation.evidence,
            ),
            created_at: now,
        }
    }
}

/// Fingerprint of a violation.
///
/// Totals, counts and contributing ids do not take part, so a violation that
/// keeps firing with a growing total keeps the same fingerprint.
pub fn fingerprint(
    rule_id: RuleId,
    rule_type: RuleType,
    transaction_id: TransactionId,
    evidence: &Evidence,
) -> String {
    // Key order is fixed by the literals here and in identity_facts.
    let canonical = json!({
        "rule_id": rule_id.to_string(),
        "rule_type": rule_type.as_str(),
        "transaction_id": transaction_id.to_string(),
        "facts": evidence.identity_facts(),
    });
    let hash = Sha256::digest(canonical.to_string().as_bytes());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
