//! # Check Subcommand
//!
//! Runs a file of transactions through the compliance checker, the way a
//! bulk import would. With `DATABASE_URL` set, transactions are recorded
//! first and cases land in the database; otherwise everything stays in
//! memory and only the report is printed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde_json::json;

use tcm_core::Transaction;
use tcm_engine::memory::{MemoryCaseStore, MemoryTransactionSource};
use tcm_engine::{
    BatchReport, CaseAggregator, CaseStore, CatalogRefresher, CheckOutcome, ComplianceChecker,
    EngineConfig, EngineMetrics, LogPublisher, TransactionSource,
};
use tcm_rules::{CatalogHandle, ComplianceRule, EvaluatorRegistry, RuleCatalog};
use tcm_store::PgStore;

use crate::input::{load_rules, load_transactions};
use crate::runtime;

/// Arguments for `tcm check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// JSON or YAML file of transactions.
    pub transactions: PathBuf,

    /// Rule file. Required without a database; with one, overrides the
    /// stored rules for this run.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Transactions checked concurrently (default: TCM_BULK_CONCURRENCY).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Print engine metrics in the Prometheus text format to stderr.
    #[arg(long)]
    pub metrics: bool,
}

fn checker(
    catalog: RuleCatalog,
    transactions: Arc<dyn TransactionSource>,
    store: Arc<dyn CaseStore>,
    config: &EngineConfig,
    metrics: Option<EngineMetrics>,
) -> ComplianceChecker {
    if !catalog.rejected().is_empty() {
        tracing::warn!(rejected = catalog.rejected().len(), "some rules are excluded from the catalog");
    }
    let checker = ComplianceChecker::new(
        CatalogHandle::new(catalog),
        Arc::new(EvaluatorRegistry::with_builtin()),
        transactions,
        CaseAggregator::new(store, Arc::new(LogPublisher), config.store_timeout),
        config.store_timeout,
    );
    match metrics {
        Some(metrics) => checker.with_metrics(metrics),
        None => checker,
    }
}

/// Check `transactions` against `rules` with in-memory adapters. Every
/// transaction of the file counts as same-day history for the others.
pub async fn check_in_memory(
    rules: Vec<ComplianceRule>,
    transactions: Vec<Transaction>,
    config: &EngineConfig,
    concurrency: usize,
    metrics: Option<EngineMetrics>,
) -> (BatchReport, MemoryCaseStore) {
    let source = MemoryTransactionSource::new();
    source.extend(transactions.iter().cloned());
    let store = MemoryCaseStore::new();
    let checker = checker(
        RuleCatalog::load(rules, Utc::now()),
        Arc::new(source),
        Arc::new(store.clone()),
        config,
        metrics,
    );
    (checker.check_batch(transactions, concurrency).await, store)
}

async fn check_with_store(
    store: PgStore,
    rules: Option<Vec<ComplianceRule>>,
    transactions: Vec<Transaction>,
    config: &EngineConfig,
    concurrency: usize,
    metrics: Option<EngineMetrics>,
) -> Result<BatchReport> {
    let mut recorded = 0;
    for tx in &transactions {
        if store.insert_transaction(tx).await? {
            recorded += 1;
        }
    }
    tracing::info!(recorded, total = transactions.len(), "transactions recorded");

    let catalog = match rules {
        Some(rules) => RuleCatalog::load(rules, Utc::now()),
        None => {
            let refresher = CatalogRefresher::new(
                Arc::new(store.clone()),
                CatalogHandle::new(RuleCatalog::empty(Utc::now())),
                config.catalog_refresh,
                config.store_timeout,
            );
            refresher
                .refresh()
                .await
                .context("loading rules from the database")?
                .as_ref()
                .clone()
        }
    };
    let shared = Arc::new(store);
    let checker = checker(catalog, shared.clone(), shared, config, metrics);
    Ok(checker.check_batch(transactions, concurrency).await)
}

fn print_report(report: &BatchReport, as_json: bool) -> Result<()> {
    if as_json {
        let items: Vec<_> = report
            .items
            .iter()
            .map(|item| match &item.result {
                Ok(outcome) => outcome_json(item.transaction_id.to_string(), outcome),
                Err(e) => json!({
                    "transaction_id": item.transaction_id,
                    "outcome": "failed",
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for item in &report.items {
        match &item.result {
            Ok(CheckOutcome::Clear) => println!("{}  clear", item.transaction_id),
            Ok(CheckOutcome::CaseOpened { case_id, findings, severity }) => println!(
                "{}  case opened {case_id} ({findings} findings, {severity})",
                item.transaction_id
            ),
            Ok(CheckOutcome::FindingsAppended { case_id, inserted, severity }) => println!(
                "{}  {inserted} findings added to {case_id} ({severity})",
                item.transaction_id
            ),
            Ok(CheckOutcome::AlreadyRecorded { case_id }) => {
                println!("{}  already recorded in {case_id}", item.transaction_id)
            }
            Err(e) => println!("{}  failed: {e}", item.transaction_id),
        }
    }
    println!(
        "{} clear, {} cases opened, {} appended, {} unchanged, {} failed",
        report.clear(),
        report.cases_opened(),
        report.findings_appended(),
        report.already_recorded(),
        report.failed()
    );
    Ok(())
}

fn outcome_json(transaction_id: String, outcome: &CheckOutcome) -> serde_json::Value {
    match outcome {
        CheckOutcome::Clear => json!({ "transaction_id": transaction_id, "outcome": "clear" }),
        CheckOutcome::CaseOpened { case_id, findings, severity } => json!({
            "transaction_id": transaction_id,
            "outcome": "case_opened",
            "case_id": case_id,
            "findings": findings,
            "severity": severity,
        }),
        CheckOutcome::FindingsAppended { case_id, inserted, severity } => json!({
            "transaction_id": transaction_id,
            "outcome": "findings_appended",
            "case_id": case_id,
            "inserted": inserted,
            "severity": severity,
        }),
        CheckOutcome::AlreadyRecorded { case_id } => json!({
            "transaction_id": transaction_id,
            "outcome": "already_recorded",
            "case_id": case_id,
        }),
    }
}

/// Run `tcm check`. Exits 1 when any transaction failed.
pub async fn run_check(args: &CheckArgs) -> Result<u8> {
    let config = runtime::config()?;
    let transactions = load_transactions(&args.transactions)?;
    let rules = args.rules.as_deref().map(load_rules).transpose()?;
    let concurrency = args.concurrency.unwrap_or(config.bulk_concurrency);
    let metrics = if args.metrics {
        Some(EngineMetrics::new().context("creating engine metrics")?)
    } else {
        None
    };

    let report = match runtime::optional_store(&config).await? {
        Some(store) => {
            check_with_store(store, rules, transactions, &config, concurrency, metrics.clone()).await?
        }
        None => {
            let rules = rules.context("--rules is required when DATABASE_URL is not set")?;
            check_in_memory(rules, transactions, &config, concurrency, metrics.clone()).await.0
        }
    };

    print_report(&report, args.json)?;
    if let Some(metrics) = &metrics {
        eprint!("{}", metrics.gather_and_encode().map_err(anyhow::Error::msg)?);
    }
    Ok(if report.failed() > 0 { 1 } else { 0 })
}
