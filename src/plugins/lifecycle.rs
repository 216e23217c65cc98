//! Lifecycle subsystem: report registration, stage transitions, history, and
//! the transition audit ledger.
//!
//! Transitions load the governance aggregate, apply the core state machine,
//! save atomically, and only then dispatch the audit event. A failed gate
//! leaves both the aggregate and the ledger untouched.

use crate::core::error;
use crate::core::governance::{AuditSink, GovernanceRecord, Repository, TransitionInput};
use crate::core::lifecycle::{DeprecationInfo, Stage, StageTransition};
use crate::core::repository::{
    initialize_governance_db, read_audit_events, validate_audit_ledger, JsonlAuditSink,
    SqliteRepository,
};
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::freeze::load_freeze_window;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser, Debug)]
#[clap(name = "lifecycle", about = "Manage report lifecycle stages")]
pub struct LifecycleCli {
    #[clap(subcommand)]
    pub command: LifecycleCommand,
}

#[derive(Subcommand, Debug)]
pub enum LifecycleCommand {
    /// Register a report with the governance plane (pre-DRAFT).
    Register {
        #[clap(long)]
        id: String,
    },
    /// Advance a report to a new stage.
    Transition {
        #[clap(long)]
        id: String,
        #[clap(long, value_enum)]
        to: Stage,
        #[clap(long)]
        actor: Option<String>,
        #[clap(long, default_value = "")]
        reason: String,
        /// Deprecation metadata, captured with transitions into DEPRECATED.
        #[clap(long)]
        deprecation_reason: Option<String>,
        #[clap(long)]
        replacement: Option<String>,
        #[clap(long)]
        retirement_date: Option<NaiveDate>,
    },
    /// Show a report's governance record.
    Show {
        #[clap(long)]
        id: String,
    },
    /// Print a report's transition history.
    History {
        #[clap(long)]
        id: String,
    },
    /// Render the transition audit ledger.
    Audit {
        /// Recompute content hashes and report tampered entries.
        #[clap(long)]
        verify: bool,
    },
}

pub fn register_report(
    store: &Store,
    report_id: &str,
    now: DateTime<Utc>,
) -> Result<GovernanceRecord, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    if repo.exists(report_id)? {
        return Err(error::SignoffError::ValidationError(format!(
            "report {} is already registered",
            report_id
        )));
    }
    let record = GovernanceRecord::new(report_id, now);
    repo.save(&record)?;
    Ok(record)
}

/// Load, transition, save, then dispatch the audit event.
pub fn transition_report(
    store: &Store,
    report_id: &str,
    input: TransitionInput<'_>,
    now: DateTime<Utc>,
) -> Result<StageTransition, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    let freeze = load_freeze_window(store)?;
    let mut record = repo.load(report_id)?;
    let transition = record.transition(input, &freeze, now)?;
    repo.save(&record)?;
    JsonlAuditSink::new(&store.root).record_transition(report_id, &transition);
    Ok(transition)
}

pub fn run_lifecycle_cli(
    store: &Store,
    default_actor: &str,
    cli: LifecycleCli,
) -> Result<(), error::SignoffError> {
    initialize_governance_db(&store.root)?;
    match cli.command {
        LifecycleCommand::Register { id } => {
            register_report(store, &id, Utc::now())?;
            println!(
                "{}",
                time::command_envelope("lifecycle.register", "ok", serde_json::json!({ "id": id }))
            );
        }
        LifecycleCommand::Transition {
            id,
            to,
            actor,
            reason,
            deprecation_reason,
            replacement,
            retirement_date,
        } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            let deprecation = deprecation_reason.map(|dep_reason| DeprecationInfo {
                reason: dep_reason,
                replacement,
                retirement_date,
            });
            let transition = transition_report(
                store,
                &id,
                TransitionInput {
                    to,
                    actor: &actor,
                    reason: &reason,
                    deprecation,
                },
                Utc::now(),
            )?;
            println!(
                "{}",
                time::command_envelope(
                    "lifecycle.transition",
                    "ok",
                    serde_json::json!({
                        "id": id,
                        "from": transition.from.map(|s| s.as_str()),
                        "to": transition.to.as_str(),
                        "actor": transition.actor,
                    })
                )
            );
        }
        LifecycleCommand::Show { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            println!("{}", serde_json::to_string_pretty(&record).unwrap());
        }
        LifecycleCommand::History { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            if record.lifecycle.history.is_empty() {
                println!("No transitions recorded for {}.", id);
            } else {
                for t in &record.lifecycle.history {
                    println!(
                        "{}  {} -> {}  by {}  ({})",
                        t.ts,
                        t.from.map(|s| s.as_str()).unwrap_or("(none)"),
                        t.to.as_str().bright_white().bold(),
                        t.actor,
                        t.reason
                    );
                }
            }
        }
        LifecycleCommand::Audit { verify } => {
            if verify {
                let failures = validate_audit_ledger(&store.root)?;
                if failures.is_empty() {
                    println!("{}", "Audit ledger verified: all hashes match.".bright_green());
                } else {
                    println!("{}", "Audit ledger verification failed:".bright_red().bold());
                    for event_id in failures {
                        println!("- {}", event_id);
                    }
                }
            } else {
                let events = read_audit_events(&store.root)?;
                for ev in events {
                    println!(
                        "{}  {}  {} -> {}  by {}",
                        ev.ts,
                        ev.report_id,
                        ev.from.as_deref().unwrap_or("(none)"),
                        ev.to,
                        ev.actor
                    );
                }
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "lifecycle",
        "version": "0.1.0",
        "description": "Report lifecycle stages, transitions, and audit ledger",
        "commands": [
            { "name": "register", "parameters": ["id"] },
            { "name": "transition", "parameters": ["id", "to", "actor", "reason"] },
            { "name": "show", "parameters": ["id"] },
            { "name": "history", "parameters": ["id"] },
            { "name": "audit", "parameters": ["verify"] }
        ],
        "storage": ["governance.db", "lifecycle.events.jsonl"]
    })
}
