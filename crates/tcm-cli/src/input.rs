//! Reading rule and transaction files.
//!
//! Files are JSON unless the extension is `.yaml` or `.yml`. A file holds
//! either a bare list or an object with a `rules` / `transactions` list.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use tcm_core::Transaction;
use tcm_rules::ComplianceRule;

#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Rules { rules: Vec<T> },
    Transactions { transactions: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Rules { rules: items } | Self::Transactions { transactions: items } => items,
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

fn load_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let listing: Listing<T> = if is_yaml(path) {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML {}", path.display()))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON {}", path.display()))?
    };
    Ok(listing.into_vec())
}

/// Rules from a JSON or YAML file.
pub fn load_rules(path: &Path) -> Result<Vec<ComplianceRule>> {
    load_list(path)
}

/// Transactions from a JSON or YAML file. Each is validated.
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let transactions: Vec<Transaction> = load_list(path)?;
    for (index, tx) in transactions.iter().enumerate() {
        tx.validate()
            .with_context(|| format!("transaction #{index} ({}) in {}", tx.id, path.display()))?;
    }
    Ok(transactions)
}
