//! Approval subsystem: ordered sign-off steps per report and the derived
//! workflow status consumed by the lifecycle gate.

use crate::core::error;
use crate::core::governance::Repository;
use crate::core::repository::{initialize_governance_db, SqliteRepository};
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::freeze::load_freeze_window;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser, Debug)]
#[clap(name = "approval", about = "Manage report approval workflows")]
pub struct ApprovalCli {
    #[clap(subcommand)]
    pub command: ApprovalCommand,
}

#[derive(Subcommand, Debug)]
pub enum ApprovalCommand {
    /// Append an approval step at the next ordered position.
    AddStep {
        #[clap(long)]
        id: String,
        #[clap(long)]
        approver: String,
        /// Optional steps do not gate the APPROVED aggregate.
        #[clap(long, default_value_t = true)]
        required: bool,
    },
    /// Approve a step.
    Approve {
        #[clap(long)]
        id: String,
        #[clap(long)]
        step_id: String,
        #[clap(long)]
        actor: Option<String>,
        #[clap(long)]
        comment: Option<String>,
    },
    /// Reject a step. Rejection is sticky for the whole workflow.
    Reject {
        #[clap(long)]
        id: String,
        #[clap(long)]
        step_id: String,
        #[clap(long)]
        actor: Option<String>,
        #[clap(long)]
        comment: Option<String>,
    },
    /// Show the workflow steps and aggregate status.
    Status {
        #[clap(long)]
        id: String,
    },
}

pub fn add_step(
    store: &Store,
    report_id: &str,
    approver: &str,
    required: bool,
    now: DateTime<Utc>,
) -> Result<String, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    let mut record = repo.load(report_id)?;
    let step_id = record.workflow.add_step(approver, required, now).step_id.clone();
    record.updated_at = now.to_rfc3339();
    repo.save(&record)?;
    Ok(step_id)
}

pub fn decide_step(
    store: &Store,
    report_id: &str,
    step_id: &str,
    approve: bool,
    actor: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<crate::core::approval::WorkflowStatus, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    let freeze = load_freeze_window(store)?;
    let mut record = repo.load(report_id)?;
    let status = if approve {
        record
            .workflow
            .approve_step(step_id, actor, comment, &freeze, now)?
    } else {
        record
            .workflow
            .reject_step(step_id, actor, comment, &freeze, now)?
    };
    record.updated_at = now.to_rfc3339();
    repo.save(&record)?;
    Ok(status)
}

pub fn run_approval_cli(
    store: &Store,
    default_actor: &str,
    cli: ApprovalCli,
) -> Result<(), error::SignoffError> {
    initialize_governance_db(&store.root)?;
    match cli.command {
        ApprovalCommand::AddStep {
            id,
            approver,
            required,
        } => {
            let step_id = add_step(store, &id, &approver, required, Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "approval.add_step",
                    "ok",
                    serde_json::json!({ "id": id, "step_id": step_id })
                )
            );
        }
        ApprovalCommand::Approve {
            id,
            step_id,
            actor,
            comment,
        } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            let status =
                decide_step(store, &id, &step_id, true, &actor, comment.as_deref(), Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "approval.approve",
                    "ok",
                    serde_json::json!({ "id": id, "step_id": step_id, "workflow_status": status.as_str() })
                )
            );
        }
        ApprovalCommand::Reject {
            id,
            step_id,
            actor,
            comment,
        } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            let status =
                decide_step(store, &id, &step_id, false, &actor, comment.as_deref(), Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "approval.reject",
                    "ok",
                    serde_json::json!({ "id": id, "step_id": step_id, "workflow_status": status.as_str() })
                )
            );
        }
        ApprovalCommand::Status { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            let status = record.workflow.status();
            let rendered = match status {
                crate::core::approval::WorkflowStatus::Approved => status.as_str().bright_green(),
                crate::core::approval::WorkflowStatus::Rejected => status.as_str().bright_red(),
                _ => status.as_str().bright_yellow(),
            };
            println!("Workflow: {}", rendered.bold());
            for step in &record.workflow.steps {
                println!(
                    "  {}. {} [{}] {} {}",
                    step.position,
                    step.approver,
                    if step.required { "required" } else { "optional" },
                    step.status.as_str(),
                    step.comment.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "approval",
        "version": "0.1.0",
        "description": "Ordered approval steps deriving a workflow status",
        "commands": [
            { "name": "add-step", "parameters": ["id", "approver", "required"] },
            { "name": "approve", "parameters": ["id", "step_id", "actor", "comment"] },
            { "name": "reject", "parameters": ["id", "step_id", "actor", "comment"] },
            { "name": "status", "parameters": ["id"] }
        ],
        "storage": ["governance.db"]
    })
}
