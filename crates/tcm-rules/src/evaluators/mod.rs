//! Built-in evaluators, one per [`RuleType`](crate::RuleType).

mod banned_accounts;
mod banned_countries;
mod daily_limit;
mod structuring;

pub use banned_accounts::BannedAccountsEvaluator;
pub use banned_countries::BannedCountriesEvaluator;
pub use daily_limit::DailyLimitEvaluator;
pub use structuring::StructuringEvaluator;

use crate::error::EvaluatorError;
use crate::rule::{ActiveRule, RuleType};

fn mismatch(rule: &ActiveRule, expected: RuleType) -> EvaluatorError {
    EvaluatorError::ParameterMismatch {
        code: rule.code.clone(),
        expected,
        actual: rule.rule_type(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    use tcm_core::{AccountId, ClientId, RuleId, Severity, Transaction, TransactionType};

    use crate::params::RuleParameters;
    use crate::rule::{ActiveRule, RuleScope};

    pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, hour, minute, 0).unwrap()
    }

    pub fn tx(client: ClientId, account: AccountId, base: Decimal, at: DateTime<Utc>) -> Transaction {
        Transaction::new(
            client,
            account,
            TransactionType::Deposit,
            base,
            "BRL",
            base,
            "BRL",
            at,
        )
        .unwrap()
    }

    pub fn rule(parameters: RuleParameters) -> ActiveRule {
        ActiveRule {
            id: RuleId::new(),
            code: "R-1".into(),
            name: "test rule".into(),
            severity: Severity::Medium,
            scope: RuleScope::Global,
            parameters,
            updated_at: Utc::now(),
        }
    }
}
