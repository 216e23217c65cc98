//! Release readiness: the caller-side go/no-go composition over the approval
//! workflow, the quality gate, the freeze window, and the current stage.
//!
//! The lifecycle state machine enforces only the approval gate; composing the
//! quality gate and the rest into a release decision is this command's job.

use crate::core::approval::WorkflowStatus;
use crate::core::error;
use crate::core::governance::Repository;
use crate::core::lifecycle::Stage;
use crate::core::repository::{initialize_governance_db, SqliteRepository};
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::freeze::load_freeze_window;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;

#[derive(Parser, Debug)]
#[clap(name = "release", about = "Release go/no-go checks")]
pub struct ReleaseCli {
    #[clap(subcommand)]
    pub command: ReleaseCommand,
}

#[derive(Subcommand, Debug)]
pub enum ReleaseCommand {
    /// Evaluate whether a report is clear to publish.
    Check {
        #[clap(long)]
        id: String,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}

#[derive(Debug, Serialize)]
pub struct ReleaseReadiness {
    pub report_id: String,
    pub stage: Option<String>,
    pub stage_allows_publish: bool,
    pub workflow_status: String,
    pub workflow_approved: bool,
    pub quality_all_passed: bool,
    pub quality_failed_count: u32,
    pub frozen: bool,
    pub go: bool,
}

pub fn release_readiness(
    store: &Store,
    report_id: &str,
    now: DateTime<Utc>,
) -> Result<ReleaseReadiness, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    let record = repo.load(report_id)?;
    let freeze = load_freeze_window(store)?;

    let stage = record.lifecycle.current;
    let stage_allows_publish = record.lifecycle.can_transition(Stage::Published);
    let workflow_status = record.workflow.status();
    let workflow_approved = workflow_status == WorkflowStatus::Approved;
    let quality_all_passed = record.quality.all_passed();
    let frozen = freeze.is_frozen(now);

    Ok(ReleaseReadiness {
        report_id: report_id.to_string(),
        stage: stage.map(|s| s.as_str().to_string()),
        stage_allows_publish,
        workflow_status: workflow_status.as_str().to_string(),
        workflow_approved,
        quality_all_passed,
        quality_failed_count: record.quality.failed_count,
        frozen,
        go: stage_allows_publish && workflow_approved && quality_all_passed && !frozen,
    })
}

fn mark(ok: bool) -> colored::ColoredString {
    if ok {
        "✓".bright_green()
    } else {
        "✗".bright_red()
    }
}

pub fn run_release_cli(store: &Store, cli: ReleaseCli) -> Result<(), error::SignoffError> {
    initialize_governance_db(&store.root)?;
    match cli.command {
        ReleaseCommand::Check { id, format } => {
            let readiness = release_readiness(store, &id, Utc::now())?;
            if format == "json" {
                println!(
                    "{}",
                    time::command_envelope(
                        "release.check",
                        if readiness.go { "go" } else { "no-go" },
                        serde_json::to_value(&readiness).unwrap()
                    )
                );
            } else {
                println!("Release readiness for {}", readiness.report_id.bold());
                println!(
                    "  {} stage {} allows publish",
                    mark(readiness.stage_allows_publish),
                    readiness.stage.as_deref().unwrap_or("(none)")
                );
                println!(
                    "  {} workflow {}",
                    mark(readiness.workflow_approved),
                    readiness.workflow_status
                );
                println!(
                    "  {} quality gate ({} failed)",
                    mark(readiness.quality_all_passed),
                    readiness.quality_failed_count
                );
                println!("  {} no freeze window", mark(!readiness.frozen));
                if readiness.go {
                    println!("{}", "GO".bright_green().bold());
                } else {
                    println!("{}", "NO-GO".bright_red().bold());
                }
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "release",
        "version": "0.1.0",
        "description": "Go/no-go composition of approval, quality, freeze, and stage",
        "commands": [
            { "name": "check", "parameters": ["id", "format"] }
        ],
        "storage": ["read-only over governance.db"]
    })
}
