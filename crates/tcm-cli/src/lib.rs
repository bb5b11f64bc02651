//! # tcm-cli — Command-Line Interface for the Compliance Engine
//!
//! ## Subcommands
//!
//! - `tcm rules validate|import`: check a rule file, or load it into the
//!   database.
//! - `tcm check`: run a file of transactions through the checker with
//!   bounded concurrency (the bulk-import path).
//! - `tcm case assign|update|show|list|add-analyst`: case review.
//!
//! ```bash
//! tcm rules validate rules.yaml
//! tcm check transactions.json --rules rules.yaml --json
//! DATABASE_URL=postgres://... tcm case list --status under-review
//! ```
//!
//! Engine settings come from the environment (`TCM_*`, `DATABASE_URL`).
//! Without `DATABASE_URL`, `check` runs fully in memory and `case` commands
//! are unavailable.

pub mod case;
pub mod check;
pub mod input;
pub mod logging;
pub mod rules;
pub mod runtime;
