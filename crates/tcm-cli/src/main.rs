//! # tcm CLI entry point
//!
//! Parses arguments, sets up logging and dispatches to the subcommand
//! handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tcm_cli::case::{run_case, CaseArgs};
use tcm_cli::check::{run_check, CheckArgs};
use tcm_cli::rules::{run_rules, RulesArgs};

/// Transaction compliance engine.
///
/// Validates rule files, checks transactions for rule violations and opens
/// compliance cases, and drives case review.
#[derive(Parser, Debug)]
#[command(name = "tcm", version, about, long_about = None)]
struct Cli {
    /// Verbose logging. Repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate or import rule files.
    Rules(RulesArgs),

    /// Check a file of transactions.
    Check(CheckArgs),

    /// Review compliance cases.
    Case(CaseArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tcm_cli::logging::init(cli.verbose, cli.log_json);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "tcm starting");

    let result = match &cli.command {
        Commands::Rules(args) => run_rules(args).await,
        Commands::Check(args) => run_check(args).await,
        Commands::Case(args) => run_case(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tcm_cli::rules::RulesCommand;

    #[test]
    fn parse_rules_validate() {
        let cli = Cli::try_parse_from(["tcm", "rules", "validate", "rules.yaml"]).unwrap();
        match cli.command {
            Commands::Rules(RulesArgs {
                command: RulesCommand::Validate { file },
            }) => assert_eq!(file, PathBuf::from("rules.yaml")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_check_with_global_flags() {
        let cli = Cli::try_parse_from([
            "tcm", "-vv", "check", "txs.json", "--rules", "r.json", "--concurrency", "4", "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.concurrency, Some(4));
                assert_eq!(args.rules, Some(PathBuf::from("r.json")));
                assert!(!args.json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["tcm"]).is_err());
    }
}
