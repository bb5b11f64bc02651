//! # Engine Metrics
//!
//! Prometheus counters for the checker, in a registry owned by the engine.
//! Hosts scrape it through [`EngineMetrics::gather_and_encode`] or register
//! the collectors in their own registry via [`EngineMetrics::registry`].

use std::sync::Arc;
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

use tcm_core::Severity;
use tcm_rules::RuleType;

use crate::checker::CheckOutcome;
use crate::error::EngineError;

/// Shared metrics state. Cheap to clone.
#[derive(Clone)]
pub struct EngineMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    checks_total: IntCounterVec,
    violations_total: IntCounterVec,
    evaluation_failures_total: IntCounterVec,
    check_duration_seconds: Histogram,
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics")
            .field("checks", &sum(&self.inner.checks_total))
            .field("violations", &sum(&self.inner.violations_total))
            .finish()
    }
}

fn sum(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

impl EngineMetrics {
    /// Fresh collectors in a fresh registry.
    ///
    /// # Errors
    ///
    /// [`prometheus::Error`] if a collector cannot be built or registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checks_total = IntCounterVec::new(
            Opts::new("tcm_checks_total", "Transactions checked, by outcome"),
            &["outcome"],
        )?;
        let violations_total = IntCounterVec::new(
            Opts::new("tcm_rule_violations_total", "Rule violations found"),
            &["rule_type", "severity"],
        )?;
        let evaluation_failures_total = IntCounterVec::new(
            Opts::new(
                "tcm_rule_evaluation_failures_total",
                "Rule evaluations that errored or panicked and were skipped",
            ),
            &["rule_type"],
        )?;
        let check_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("tcm_check_duration_seconds", "Time to check one transaction")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(violations_total.clone()))?;
        registry.register(Box::new(evaluation_failures_total.clone()))?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                checks_total,
                violations_total,
                evaluation_failures_total,
                check_duration_seconds,
            }),
        })
    }

    /// The registry holding every engine collector.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn record_check(&self, result: &Result<CheckOutcome, EngineError>, elapsed: Duration) {
        let outcome = match result {
            Ok(CheckOutcome::Clear) => "clear",
            Ok(CheckOutcome::CaseOpened { .. }) => "case_opened",
            Ok(CheckOutcome::FindingsAppended { .. }) => "findings_appended",
            Ok(CheckOutcome::AlreadyRecorded { .. }) => "already_recorded",
            Err(_) => "failed",
        };
        self.inner.checks_total.with_label_values(&[outcome]).inc();
        self.inner
            .check_duration_seconds
            .observe(elapsed.as_secs_f64());
    }

    pub(crate) fn record_violation(&self, rule_type: RuleType, severity: Severity) {
        self.inner
            .violations_total
            .with_label_values(&[rule_type.as_str(), severity.as_str()])
            .inc();
    }

    pub(crate) fn record_evaluation_failure(&self, rule_type: RuleType) {
        self.inner
            .evaluation_failures_total
            .with_label_values(&[rule_type.as_str()])
            .inc();
    }

    /// Checks recorded with `outcome` (`clear`, `case_opened`,
    /// `findings_appended`, `already_recorded` or `failed`).
    pub fn checks(&self, outcome: &str) -> u64 {
        self.inner.checks_total.with_label_values(&[outcome]).get()
    }

    /// Violations recorded across all rule types.
    pub fn violations(&self) -> u64 {
        sum(&self.inner.violations_total)
    }

    /// Evaluation failures recorded for `rule_type`.
    pub fn evaluation_failures(&self, rule_type: RuleType) -> u64 {
        self.inner
            .evaluation_failures_total
            .with_label_values(&[rule_type.as_str()])
            .get()
    }

    /// Gather all metrics and encode them in the Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcm_core::CaseId;

    #[test]
    fn outcomes_are_counted_by_label() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.record_check(&Ok(CheckOutcome::Clear), Duration::from_millis(2));
        metrics.record_check(&Ok(CheckOutcome::Clear), Duration::from_millis(2));
        metrics.record_check(
            &Ok(CheckOutcome::AlreadyRecorded { case_id: CaseId::new() }),
            Duration::from_millis(1),
        );
        assert_eq!(metrics.checks("clear"), 2);
        assert_eq!(metrics.checks("already_recorded"), 1);
        assert_eq!(metrics.checks("failed"), 0);
    }

    #[test]
    fn encoded_text_names_the_collectors() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.record_violation(RuleType::DailyLimit, Severity::High);
        metrics.record_evaluation_failure(RuleType::Structuring);
        let text = metrics.gather_and_encode().unwrap();
        assert!(text.contains("tcm_rule_violations_total{rule_type=\"DailyLimit\",severity=\"High\"} 1"));
        assert!(text.contains("tcm_rule_evaluation_failures_total"));
        assert_eq!(metrics.violations(), 1);
        assert_eq!(metrics.evaluation_failures(RuleType::Structuring), 1);
    }

    #[test]
    fn separate_instances_do_not_share_counts() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.record_violation(RuleType::BannedCountries, Severity::Low);
        assert_eq!(b.violations(), 0);
    }
}
