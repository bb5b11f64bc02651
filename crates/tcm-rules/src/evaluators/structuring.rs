use crate::error::EvaluatorError;
use crate::evaluator::{EvaluationContext, RuleEvaluator, Violation};
use crate::evidence::Evidence;
use crate::params::RuleParameters;
use crate::rule::{ActiveRule, RuleType};

/// Fires when at least `n` of the subject's same-day transactions have a
/// base amount strictly below `xBaseAmount`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuringEvaluator;

impl RuleEvaluator for StructuringEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::Structuring
    }

    fn needs_history(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        rule: &ActiveRule,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Violation>, EvaluatorError> {
        let RuleParameters::Structuring(params) = &rule.parameters else {
            return Err(super::mismatch(rule, RuleType::Structuring));
        };
        let subject = rule.scope.subject_for(ctx.transaction);

        let mut small: Vec<_> = ctx
            .same_day()
            .filter(|t| subject.includes(t) && t.base_amount < params.x_base_amount)
            .collect();
        if small.len() < params.n as usize {
            return Ok(None);
        }
        small.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));

        Ok(Some(Violation::new(
            rule,
            Evidence::Structuring {
                n: params.n,
                x_base_amount: params.x_base_amount,
                transaction_ids: small.iter().map(|t| t.id).collect(),
                day: ctx.transaction.day(),
            },
        )))
    }
}
