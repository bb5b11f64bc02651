use rust_decimal::Decimal;

use crate::error::EvaluatorError;
use crate::evaluator::{EvaluationContext, RuleEvaluator, Violation};
use crate::evidence::Evidence;
use crate::params::RuleParameters;
use crate::rule::{ActiveRule, RuleType};

/// Fires when the subject's same-day base-amount total strictly exceeds
/// `limitBaseAmount`. A total equal to the limit does not fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyLimitEvaluator;

impl RuleEvaluator for DailyLimitEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::DailyLimit
    }

    fn needs_history(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        rule: &ActiveRule,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Violation>, EvaluatorError> {
        let RuleParameters::DailyLimit(params) = &rule.parameters else {
            return Err(super::mismatch(rule, RuleType::DailyLimit));
        };
        let subject = rule.scope.subject_for(ctx.transaction);

        let mut total = Decimal::ZERO;
        let mut count = 0usize;
        for tx in ctx.same_day().filter(|t| subject.includes(t)) {
            total = total
                .checked_add(tx.base_amount)
                .ok_or_else(|| EvaluatorError::Failed {
                    code: rule.code.clone(),
                    message: "same-day total overflowed".into(),
                })?;
            count += 1;
        }

        if total <= params.limit_base_amount {
            return Ok(None);
        }
        Ok(Some(Violation::new(
            rule,
            Evidence::DailyLimit {
                limit: params.limit_base_amount,
                total,
                transaction_count: count,
                day: ctx.transaction.day(),
            },
        )))
    }
}
