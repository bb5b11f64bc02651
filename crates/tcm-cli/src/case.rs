//! # Case Subcommand
//!
//! Reviewer operations against the case database:
//!
//! - `assign`: assign or reassign an analyst.
//! - `update`: change status, decision and/or analyst.
//! - `show`: a case with its findings.
//! - `list`: filtered, paginated case list, newest first.
//! - `add-analyst`: register an analyst so assignments to them are accepted.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use tcm_cases::{CaseDecision, CaseStatus, CaseUpdate};
use tcm_core::{AnalystId, CaseId, ClientId, Severity};
use tcm_engine::{CaseQuery, CaseReviewService, EngineError, LogPublisher};

use crate::runtime;

/// Arguments for `tcm case`.
#[derive(Args, Debug)]
pub struct CaseArgs {
    #[command(subcommand)]
    pub command: CaseCommand,
}

/// Case subcommands.
#[derive(Subcommand, Debug)]
pub enum CaseCommand {
    /// Assign an analyst. A New case moves to UnderReview.
    Assign {
        /// Case id.
        #[arg(long)]
        case: CaseId,
        /// Analyst id.
        #[arg(long)]
        analyst: AnalystId,
    },

    /// Change status, decision and/or analyst.
    Update {
        /// Case id.
        #[arg(long)]
        case: CaseId,
        /// Target status (New, UnderReview, Resolved).
        #[arg(long)]
        status: Option<CaseStatus>,
        /// Decision (Fraudulent, NotFraudulent, Inconclusive). Implies
        /// Resolved when no status is given.
        #[arg(long)]
        decision: Option<CaseDecision>,
        /// Analyst id.
        #[arg(long)]
        analyst: Option<AnalystId>,
    },

    /// Show a case and its findings.
    Show {
        /// Case id.
        #[arg(long)]
        case: CaseId,
    },

    /// List cases, newest first.
    List {
        /// Only this status.
        #[arg(long)]
        status: Option<CaseStatus>,
        /// Only at or above this severity.
        #[arg(long)]
        min_severity: Option<Severity>,
        /// Only cases of this analyst.
        #[arg(long)]
        analyst: Option<AnalystId>,
        /// Only cases of this client.
        #[arg(long)]
        client: Option<ClientId>,
        /// Page number, from 1.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Page size, at most 100.
        #[arg(long, default_value_t = CaseQuery::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// Register an analyst.
    AddAnalyst {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Id to use; generated when omitted.
        #[arg(long)]
        id: Option<AnalystId>,
    },
}

/// Run `tcm case`. A rejected lifecycle request exits 2; infrastructure
/// failures are errors.
pub async fn run_case(args: &CaseArgs) -> Result<u8> {
    let config = runtime::config()?;
    let store = Arc::new(runtime::require_store(&config).await?);
    let service = CaseReviewService::new(store.clone(), Arc::new(LogPublisher), config.store_timeout)
        .with_analyst_directory(store.clone());

    let result = match &args.command {
        CaseCommand::Assign { case, analyst } => service
            .assign_to_analyst(*case, *analyst)
            .await
            .map(|c| json!(c)),
        CaseCommand::Update {
            case,
            status,
            decision,
            analyst,
        } => {
            let update = CaseUpdate {
                status: *status,
                decision: *decision,
                analyst_id: *analyst,
            };
            service.update(*case, update).await.map(|c| json!(c))
        }
        CaseCommand::Show { case } => match service.get(*case).await {
            Ok(found) => service
                .findings(*case)
                .await
                .map(|findings| json!({ "case": found, "findings": findings })),
            Err(e) => Err(e),
        },
        CaseCommand::List {
            status,
            min_severity,
            analyst,
            client,
            page,
            page_size,
        } => service
            .list(&CaseQuery {
                status: *status,
                min_severity: *min_severity,
                analyst_id: *analyst,
                client_id: *client,
                page: *page,
                page_size: *page_size,
            })
            .await
            .map(|p| json!(p)),
        CaseCommand::AddAnalyst { name, id } => {
            let analyst_id = id.unwrap_or_default();
            let created = store.insert_analyst(analyst_id, name).await?;
            println!("{}", json!({ "analyst_id": analyst_id, "created": created }));
            return Ok(0);
        }
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(0)
        }
        Err(EngineError::Lifecycle(e)) => {
            eprintln!("rejected: {e}");
            Ok(2)
        }
        Err(e) => Err(e.into()),
    }
}
