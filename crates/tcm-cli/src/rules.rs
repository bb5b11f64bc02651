//! # Rules Subcommand
//!
//! - `validate`: parse a rule file and report rules the engine would
//!   exclude from its catalog.
//! - `import`: upsert a rule file into the database, keyed by code.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};

use tcm_rules::{ComplianceRule, RuleCatalog};

use crate::input::load_rules;
use crate::runtime;

/// Arguments for `tcm rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

/// Rule subcommands.
#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Check a JSON or YAML rule file.
    Validate {
        /// Rule file.
        file: PathBuf,
    },
    /// Load a rule file into the database.
    Import {
        /// Rule file.
        file: PathBuf,
        /// Import even when some active rules are invalid. They stay
        /// excluded from the catalog until fixed.
        #[arg(long)]
        allow_invalid: bool,
    },
}

/// Outcome of validating a rule set.
#[derive(Debug)]
pub struct RuleReport {
    /// Catalog the engine would build.
    pub catalog: RuleCatalog,
    /// Codes used by more than one rule.
    pub duplicate_codes: Vec<String>,
    /// Rules flagged inactive.
    pub inactive: usize,
}

impl RuleReport {
    /// Whether every active rule is usable and codes are unique.
    pub fn is_clean(&self) -> bool {
        self.catalog.rejected().is_empty() && self.duplicate_codes.is_empty()
    }
}

/// Validate `rules` the way the catalog will.
pub fn validate(rules: &[ComplianceRule]) -> RuleReport {
    let mut codes: BTreeMap<&str, usize> = BTreeMap::new();
    for rule in rules {
        *codes.entry(rule.code.trim()).or_default() += 1;
    }
    RuleReport {
        catalog: RuleCatalog::load(rules.iter().cloned(), Utc::now()),
        duplicate_codes: codes
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(code, _)| code.to_string())
            .collect(),
        inactive: rules.iter().filter(|r| !r.is_active).count(),
    }
}

fn print_report(report: &RuleReport) {
    for rule in report.catalog.rules() {
        println!("ok       {:<16} {:<16} scope={} severity={}", rule.code, rule.rule_type(), rule.scope, rule.severity);
    }
    for rejected in report.catalog.rejected() {
        println!("invalid  {:<16} {}", rejected.code, rejected.error);
    }
    for code in &report.duplicate_codes {
        println!("dup      {code:<16} code used by more than one rule");
    }
    println!(
        "{} usable, {} invalid, {} inactive, {} duplicate codes",
        report.catalog.len(),
        report.catalog.rejected().len(),
        report.inactive,
        report.duplicate_codes.len()
    );
}

/// Run `tcm rules`. Returns the process exit code.
pub async fn run_rules(args: &RulesArgs) -> Result<u8> {
    match &args.command {
        RulesCommand::Validate { file } => {
            let report = validate(&load_rules(file)?);
            print_report(&report);
            Ok(if report.is_clean() { 0 } else { 2 })
        }
        RulesCommand::Import {
            file,
            allow_invalid,
        } => {
            let rules = load_rules(file)?;
            let report = validate(&rules);
            if !report.duplicate_codes.is_empty() {
                print_report(&report);
                bail!("rule codes must be unique");
            }
            if !report.catalog.rejected().is_empty() && !allow_invalid {
                print_report(&report);
                bail!("rule file has invalid rules; pass --allow-invalid to import anyway");
            }
            let config = runtime::config()?;
            let store = runtime::require_store(&config).await?;
            for rule in &rules {
                store.upsert_rule(rule).await?;
            }
            println!("imported {} rules", rules.len());
            Ok(0)
        }
    }
}
