use crate::error::EvaluatorError;
use crate::evaluator::{EvaluationContext, RuleEvaluator, Violation};
use crate::evidence::Evidence;
use crate::params::RuleParameters;
use crate::rule::{ActiveRule, RuleType};

/// Fires on a transfer whose counterparty country is banned.
#[derive(Debug, Clone, Copy, Default)]
pub struct BannedCountriesEvaluator;

impl RuleEvaluator for BannedCountriesEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::BannedCountries
    }

    fn evaluate(
        &self,
        rule: &ActiveRule,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Violation>, EvaluatorError> {
        let RuleParameters::BannedCountries(params) = &rule.parameters else {
            return Err(super::mismatch(rule, RuleType::BannedCountries));
        };
        let tx = ctx.transaction;
        if !tx.is_transfer() {
            return Ok(None);
        }
        Ok(tx
            .counterparty_country()
            .filter(|country| params.countries.contains(*country))
            .map(|country| {
                Violation::new(
                    rule,
                    Evidence::BannedCountry {
                        country: country.clone(),
                    },
                )
            }))
    }
}
