//! # Rule Model
//!
//! [`ComplianceRule`] is the record configuration management stores.
//! [`ActiveRule`] is the same rule after its scope and parameters have been
//! parsed; only active rules whose configuration parses make it into a
//! catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tcm_core::{AccountId, ClientId, CountryCode, RuleId, Severity, Transaction};

use crate::error::RuleConfigError;
use crate::params::RuleParameters;

/// Kind of compliance rule. Each kind has exactly one evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleType {
    /// Same-day base-amount total above a limit.
    DailyLimit,
    /// Transfer to a sanctioned country.
    BannedCountries,
    /// Transfer to a blocked counterparty account or identifier.
    BannedAccounts,
    /// Many small same-day transactions under a threshold.
    Structuring,
}

impl RuleType {
    /// All rule types.
    pub fn all() -> &'static [RuleType] {
        &[
            Self::DailyLimit,
            Self::BannedCountries,
            Self::BannedAccounts,
            Self::Structuring,
        ]
    }

    /// The canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLimit => "DailyLimit",
            Self::BannedCountries => "BannedCountries",
            Self::BannedAccounts => "BannedAccounts",
            Self::Structuring => "Structuring",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown rule type {s:?}"))
    }
}

// ── Scope ──────────────────────────────────────────────────────────────

/// Where a rule applies and what it aggregates over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleScope {
    /// Every transaction; aggregates over the client.
    Global,
    /// Only transactions whose relevant country matches; aggregates over
    /// the client.
    Country(CountryCode),
    /// Every transaction; aggregates over the account.
    PerAccount,
}

impl RuleScope {
    /// Parse a stored scope. `None`, blank and `global` (any case) are
    /// [`RuleScope::Global`].
    ///
    /// # Errors
    ///
    /// [`RuleConfigError::InvalidScope`] for anything else that is not a
    /// two-letter country code.
    pub fn parse(raw: Option<&str>) -> Result<Self, RuleConfigError> {
        let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::Global);
        };
        if value.eq_ignore_ascii_case("global") {
            return Ok(Self::Global);
        }
        if value.eq_ignore_ascii_case("peraccount") {
            return Ok(Self::PerAccount);
        }
        CountryCode::new(value)
            .map(Self::Country)
            .map_err(|_| RuleConfigError::InvalidScope(value.to_string()))
    }

    /// Whether a rule with this scope applies to `tx`.
    ///
    /// A country scope matches the counterparty country of a transfer and the
    /// account country of anything else. A transaction with no relevant
    /// country never matches a country scope.
    pub fn applies_to(&self, tx: &Transaction) -> bool {
        match self {
            Self::Global | Self::PerAccount => true,
            Self::Country(code) => tx.relevant_country() == Some(code),
        }
    }

    /// The aggregation subject for `tx` under this scope.
    pub fn subject_for(&self, tx: &Transaction) -> AggregationSubject {
        match self {
            Self::PerAccount => AggregationSubject::Account(tx.account_id),
            Self::Global | Self::Country(_) => AggregationSubject::Client(tx.client_id),
        }
    }
}

impl std::fmt::Display for RuleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Country(code) => write!(f, "{code}"),
            Self::PerAccount => f.write_str("PerAccount"),
        }
    }
}

/// Whose same-day transactions feed an aggregating rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationSubject {
    /// All accounts of a client.
    Client(ClientId),
    /// A single account.
    Account(AccountId),
}

impl AggregationSubject {
    /// Whether `tx` belongs to this subject.
    pub fn includes(&self, tx: &Transaction) -> bool {
        match self {
            Self::Client(id) => tx.client_id == *id,
            Self::Account(id) => tx.account_id == *id,
        }
    }
}

impl std::fmt::Display for AggregationSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(id) => write!(f, "client:{id}"),
            Self::Account(id) => write!(f, "account:{id}"),
        }
    }
}

// ── Stored and active rules ────────────────────────────────────────────

fn default_active() -> bool {
    true
}

/// A compliance rule as stored by configuration management.
///
/// Consumed read-only. `parameters` is the raw JSON document; it is parsed
/// by [`ActiveRule::from_rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRule {
    /// Rule identifier.
    pub id: RuleId,
    /// Short stable code, e.g. `DL-BR-01`.
    pub code: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Rule kind.
    pub rule_type: RuleType,
    /// Inactive rules are never evaluated.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Severity assigned to findings of this rule.
    pub severity: Severity,
    /// `null`, `"global"`, `"PerAccount"` or a country code.
    #[serde(default)]
    pub scope: Option<String>,
    /// Rule-type specific parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Last modification time.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// An active rule with parsed scope and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRule {
    /// Rule identifier.
    pub id: RuleId,
    /// Short stable code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Severity assigned to findings of this rule.
    pub severity: Severity,
    /// Parsed scope.
    pub scope: RuleScope,
    /// Parsed parameters; the variant fixes the rule type.
    pub parameters: RuleParameters,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ActiveRule {
    /// Parse a stored rule. Does not look at `is_active`.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn from_rule(rule: &ComplianceRule) -> Result<Self, RuleConfigError> {
        if rule.code.trim().is_empty() {
            return Err(RuleConfigError::BlankCode);
        }
        let scope = RuleScope::parse(rule.scope.as_deref())?;
        let parameters = RuleParameters::parse(rule.rule_type, &rule.parameters)?;
        Ok(Self {
            id: rule.id,
            code: rule.code.trim().to_string(),
            name: rule.name.clone(),
            severity: rule.severity,
            scope,
            parameters,
            updated_at: rule.updated_at,
        })
    }

    /// Rule type, derived from the parameters variant.
    pub fn rule_type(&self) -> RuleType {
        self.parameters.rule_type()
    }

    /// Whether this rule applies to `tx`.
    pub fn applies_to(&self, tx: &Transaction) -> bool {
        self.scope.applies_to(tx)
    }
}
