//! # Rule Parameters
//!
//! Configuration management stores rule parameters as free-form JSON. They
//! are parsed into [`RuleParameters`] once, when the rule enters the catalog,
//! so evaluators only ever see well-formed values.
//!
//! | Rule type | Keys |
//! |---|---|
//! | DailyLimit | `limitBaseAmount` (number > 0) |
//! | BannedCountries | `countries` (array of 2-letter codes) |
//! | BannedAccounts | `accountIdentifiers` or `entries` (array of non-blank strings) |
//! | Structuring | `n` (integer > 0), `xBaseAmount` (number > 0) |

use std::collections::BTreeSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use tcm_core::CountryCode;

use crate::error::RuleConfigError;
use crate::rule::RuleType;

/// Parameters of a DailyLimit rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyLimitParams {
    /// Same-day base-amount total that must be strictly exceeded.
    pub limit_base_amount: Decimal,
}

/// Parameters of a BannedCountries rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannedCountriesParams {
    /// Normalized, de-duplicated country codes.
    pub countries: BTreeSet<CountryCode>,
}

/// Parameters of a BannedAccounts rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannedAccountsParams {
    /// Trimmed, lower-cased account numbers or identifier values.
    pub identifiers: BTreeSet<String>,
}

impl BannedAccountsParams {
    /// Normalize a value for comparison against [`Self::identifiers`].
    pub fn normalize(value: &str) -> String {
        value.trim().to_lowercase()
    }

    /// The configured entry matching `value`, if any.
    pub fn matching(&self, value: &str) -> Option<&String> {
        self.identifiers.get(&Self::normalize(value))
    }
}

/// Parameters of a Structuring rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringParams {
    /// Number of small same-day transactions that triggers the rule.
    pub n: u32,
    /// A transaction is small when its base amount is below this.
    pub x_base_amount: Decimal,
}

/// Typed parameters, one variant per [`RuleType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleParameters {
    /// See [`DailyLimitParams`].
    DailyLimit(DailyLimitParams),
    /// See [`BannedCountriesParams`].
    BannedCountries(BannedCountriesParams),
    /// See [`BannedAccountsParams`].
    BannedAccounts(BannedAccountsParams),
    /// See [`StructuringParams`].
    Structuring(StructuringParams),
}

impl RuleParameters {
    /// Parse raw parameters for `rule_type`.
    ///
    /// # Errors
    ///
    /// Returns the first problem found; unknown keys are ignored.
    pub fn parse(rule_type: RuleType, raw: &Value) -> Result<Self, RuleConfigError> {
        let obj = raw
            .as_object()
            .ok_or(RuleConfigError::NotAnObject { rule_type })?;
        match rule_type {
            RuleType::DailyLimit => Ok(Self::DailyLimit(DailyLimitParams {
                limit_base_amount: positive_decimal(rule_type, obj, "limitBaseAmount")?,
            })),
            RuleType::BannedCountries => {
                let entries = string_array(rule_type, obj, "countries")?;
                let mut countries = BTreeSet::new();
                for (index, entry) in entries.into_iter().enumerate() {
                    let code = CountryCode::new(entry).map_err(|e| RuleConfigError::InvalidEntry {
                        rule_type,
                        field: "countries",
                        index,
                        reason: e.to_string(),
                    })?;
                    countries.insert(code);
                }
                Ok(Self::BannedCountries(BannedCountriesParams { countries }))
            }
            RuleType::BannedAccounts => {
                let field = if obj.contains_key("accountIdentifiers") {
                    "accountIdentifiers"
                } else {
                    "entries"
                };
                let entries = string_array(rule_type, obj, field)?;
                let mut identifiers = BTreeSet::new();
                for (index, entry) in entries.into_iter().enumerate() {
                    let normalized = BannedAccountsParams::normalize(entry);
                    if normalized.is_empty() {
                        return Err(RuleConfigError::InvalidEntry {
                            rule_type,
                            field,
                            index,
                            reason: "must not be blank".into(),
                        });
                    }
                    identifiers.insert(normalized);
                }
                Ok(Self::BannedAccounts(BannedAccountsParams { identifiers }))
            }
            RuleType::Structuring => Ok(Self::Structuring(StructuringParams {
                n: positive_count(rule_type, obj, "n")?,
                x_base_amount: positive_decimal(rule_type, obj, "xBaseAmount")?,
            })),
        }
    }

    /// The rule type these parameters belong to.
    pub fn rule_type(&self) -> RuleType {
        match self {
            Self::DailyLimit(_) => RuleType::DailyLimit,
            Self::BannedCountries(_) => RuleType::BannedCountries,
            Self::BannedAccounts(_) => RuleType::BannedAccounts,
            Self::Structuring(_) => RuleType::Structuring,
        }
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn positive_decimal(
    rule_type: RuleType,
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Decimal, RuleConfigError> {
    let missing = RuleConfigError::MissingField {
        rule_type,
        field,
        expected: "number",
    };
    let Some(Value::Number(number)) = obj.get(field) else {
        return Err(missing);
    };
    // Go through the textual form so 0.1 stays exactly 0.1.
    let text = number.to_string();
    let value = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| missing)?;
    if value <= Decimal::ZERO {
        return Err(RuleConfigError::NonPositive {
            rule_type,
            field,
            value: text,
        });
    }
    Ok(value.normalize())
}

fn positive_count(
    rule_type: RuleType,
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<u32, RuleConfigError> {
    let missing = RuleConfigError::MissingField {
        rule_type,
        field,
        expected: "integer",
    };
    let Some(Value::Number(number)) = obj.get(field) else {
        return Err(missing);
    };
    if let Some(n) = number.as_i64() {
        if n <= 0 {
            return Err(RuleConfigError::NonPositive {
                rule_type,
                field,
                value: n.to_string(),
            });
        }
        return u32::try_from(n).map_err(|_| missing);
    }
    Err(missing)
}

fn string_array<'a>(
    rule_type: RuleType,
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Vec<&'a str>, RuleConfigError> {
    let Some(Value::Array(items)) = obj.get(field) else {
        return Err(RuleConfigError::MissingField {
            rule_type,
            field,
            expected: "array",
        });
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str().ok_or_else(|| RuleConfigError::InvalidEntry {
                rule_type,
                field,
                index,
                reason: "expected a string".into(),
            })
        })
        .collect()
}
