use crate::error::EvaluatorError;
use crate::evaluator::{EvaluationContext, RuleEvaluator, Violation};
use crate::evidence::{Evidence, MatchedField};
use crate::params::RuleParameters;
use crate::rule::{ActiveRule, RuleType};

/// Fires when the counterparty account number or identifier value matches a
/// banned entry, ignoring case and surrounding whitespace. The account number
/// is checked first.
#[derive(Debug, Clone, Copy, Default)]
pub struct BannedAccountsEvaluator;

impl RuleEvaluator for BannedAccountsEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::BannedAccounts
    }

    fn evaluate(
        &self,
        rule: &ActiveRule,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Violation>, EvaluatorError> {
        let RuleParameters::BannedAccounts(params) = &rule.parameters else {
            return Err(super::mismatch(rule, RuleType::BannedAccounts));
        };
        let Some(counterparty) = ctx.transaction.counterparty.as_ref() else {
            return Ok(None);
        };

        let candidates = [
            (counterparty.account.as_deref(), MatchedField::Account),
            (counterparty.identifier.as_deref(), MatchedField::Identifier),
        ];
        for (value, field) in candidates {
            let Some(value) = value else { continue };
            if let Some(entry) = params.matching(value) {
                return Ok(Some(Violation::new(
                    rule,
                    Evidence::BannedAccount {
                        entry: entry.clone(),
                        value: value.trim().to_string(),
                        field,
                    },
                )));
            }
        }
        Ok(None)
    }
}
