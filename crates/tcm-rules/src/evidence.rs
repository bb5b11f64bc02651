//! # Violation Evidence
//!
//! The rule-specific facts an evaluator records when a rule fires. Evidence
//! is split into *identity facts* (what the rule was configured to catch)
//! and *observed facts* (totals, counts, contributing ids). Observed facts
//! drift as more same-day transactions arrive, so only identity facts take
//! part in finding de-duplication.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tcm_core::{CountryCode, TransactionId};

/// Which counterparty field matched a banned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    /// Counterparty account number.
    Account,
    /// Counterparty identifier value.
    Identifier,
}

/// Facts supporting a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Same-day total exceeded the limit.
    DailyLimit {
        /// Configured limit.
        limit: Decimal,
        /// Computed same-day total, inclusive of the evaluated transaction.
        total: Decimal,
        /// Number of transactions contributing to `total`.
        transaction_count: usize,
        /// UTC day aggregated over.
        day: NaiveDate,
    },
    /// Transfer to a banned country.
    BannedCountry {
        /// Counterparty country that matched.
        country: CountryCode,
    },
    /// Transfer to a banned account or identifier.
    BannedAccount {
        /// Configured entry that matched, normalized.
        entry: String,
        /// Value observed on the transaction.
        value: String,
        /// Which counterparty field carried `value`.
        field: MatchedField,
    },
    /// Too many small same-day transactions.
    Structuring {
        /// Configured count threshold.
        n: u32,
        /// Configured amount threshold.
        x_base_amount: Decimal,
        /// Small same-day transactions, oldest first.
        transaction_ids: Vec<TransactionId>,
        /// UTC day aggregated over.
        day: NaiveDate,
    },
}

impl Evidence {
    /// Short kind tag, matching the serialized `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DailyLimit { .. } => "daily_limit",
            Self::BannedCountry { .. } => "banned_country",
            Self::BannedAccount { .. } => "banned_account",
            Self::Structuring { .. } => "structuring",
        }
    }

    /// The stable subset of the evidence: configured thresholds and matched
    /// values, without totals, counts or contributing ids. Decimals are
    /// normalized so `1000` and `1000.00` agree.
    pub fn identity_facts(&self) -> Value {
        match self {
            Self::DailyLimit { limit, .. } => json!({
                "kind": self.kind(),
                "limit": limit.normalize().to_string(),
            }),
            Self::BannedCountry { country } => json!({
                "kind": self.kind(),
                "country": country.as_str(),
            }),
            Self::BannedAccount { entry, field, .. } => json!({
                "kind": self.kind(),
                "entry": entry,
                "field": field,
            }),
            Self::Structuring { n, x_base_amount, .. } => json!({
                "kind": self.kind(),
                "n": n,
                "x_base_amount": x_base_amount.normalize().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    #[test]
    fn identity_facts_ignore_drifting_totals() {
        let a = Evidence::DailyLimit {
            limit: dec!(1000),
            total: dec!(1200),
            transaction_count: 2,
            day: day(),
        };
        let b = Evidence::DailyLimit {
            limit: dec!(1000.00),
            total: dec!(1500),
            transaction_count: 3,
            day: day(),
        };
        assert_eq!(a.identity_facts(), b.identity_facts());
    }

    #[test]
    fn identity_facts_track_configuration() {
        let a = Evidence::Structuring {
            n: 3,
            x_base_amount: dec!(1000),
            transaction_ids: vec![TransactionId::new()],
            day: day(),
        };
        let b = Evidence::Structuring {
            n: 4,
            x_base_amount: dec!(1000),
            transaction_ids: vec![],
            day: day(),
        };
        assert_ne!(a.identity_facts(), b.identity_facts());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let ev = Evidence::BannedCountry {
            country: CountryCode::new("IR").unwrap(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "banned_country");
        assert_eq!(json["country"], "IR");
        let back: Evidence = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }
}
