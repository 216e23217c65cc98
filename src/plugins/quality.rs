//! Quality subsystem: named pass/fail checks per report and the aggregate
//! gate signal consumed by the release check.

use crate::core::error;
use crate::core::governance::Repository;
use crate::core::quality::CheckSeverity;
use crate::core::repository::{initialize_governance_db, SqliteRepository};
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser, Debug)]
#[clap(name = "quality", about = "Manage report quality checks")]
pub struct QualityCli {
    #[clap(subcommand)]
    pub command: QualityCommand,
}

#[derive(Subcommand, Debug)]
pub enum QualityCommand {
    /// Record a quality check result.
    Record {
        #[clap(long)]
        id: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        passed: bool,
        #[clap(long, value_enum, default_value = "medium")]
        severity: CheckSeverity,
        #[clap(long, default_value_t = 0.0)]
        score: f64,
    },
    /// List recorded checks.
    List {
        #[clap(long)]
        id: String,
    },
    /// Show the aggregate gate signal.
    Gate {
        #[clap(long)]
        id: String,
    },
}

pub fn record_check(
    store: &Store,
    report_id: &str,
    name: &str,
    passed: bool,
    severity: CheckSeverity,
    score: f64,
    now: DateTime<Utc>,
) -> Result<String, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    let mut record = repo.load(report_id)?;
    let check_id = record
        .quality
        .record_check(name, passed, severity, score, now)
        .check_id
        .clone();
    record.updated_at = now.to_rfc3339();
    repo.save(&record)?;
    Ok(check_id)
}

pub fn run_quality_cli(store: &Store, cli: QualityCli) -> Result<(), error::SignoffError> {
    initialize_governance_db(&store.root)?;
    match cli.command {
        QualityCommand::Record {
            id,
            name,
            passed,
            severity,
            score,
        } => {
            let check_id = record_check(store, &id, &name, passed, severity, score, Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "quality.record",
                    "ok",
                    serde_json::json!({ "id": id, "check_id": check_id, "passed": passed })
                )
            );
        }
        QualityCommand::List { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record.quality.checks).unwrap()
            );
        }
        QualityCommand::Gate { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            if record.quality.all_passed() {
                println!(
                    "{} ({} checks)",
                    "PASS".bright_green().bold(),
                    record.quality.checks.len()
                );
            } else {
                println!(
                    "{} ({} of {} checks failed)",
                    "FAIL".bright_red().bold(),
                    record.quality.failed_count,
                    record.quality.checks.len()
                );
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "quality",
        "version": "0.1.0",
        "description": "Pass/fail quality checks aggregated into a gate signal",
        "commands": [
            { "name": "record", "parameters": ["id", "name", "passed", "severity", "score"] },
            { "name": "list", "parameters": ["id"] },
            { "name": "gate", "parameters": ["id"] }
        ],
        "storage": ["governance.db"]
    })
}
