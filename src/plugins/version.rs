//! Version subsystem: the per-report version ledger and its current pointer.
//!
//! The CLI supplies the numbers. `--bump <kind>` computes them caller-side
//! from the current pointer; the ledger itself only records what it is given.

use crate::core::error;
use crate::core::governance::Repository;
use crate::core::repository::{initialize_governance_db, SqliteRepository};
use crate::core::store::Store;
use crate::core::time;
use crate::core::version::{next_version, ChangeKind, Version, VersionInput};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "version", about = "Manage the report version ledger")]
pub struct VersionCli {
    #[clap(subcommand)]
    pub command: VersionCommand,
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Record a new current version.
    Add {
        #[clap(long)]
        id: String,
        /// Explicit version numbers; omitted when --bump is used.
        #[clap(long)]
        major: Option<u32>,
        #[clap(long)]
        minor: Option<u32>,
        #[clap(long)]
        patch: Option<u32>,
        /// Compute the next number from the current pointer.
        #[clap(long, value_enum)]
        bump: Option<ChangeKind>,
        #[clap(long, value_enum, default_value = "minor")]
        kind: ChangeKind,
        #[clap(long)]
        by: Option<String>,
        #[clap(long)]
        notes: Option<String>,
    },
    /// List the ledger.
    List {
        #[clap(long)]
        id: String,
    },
    /// Show the current version.
    Current {
        #[clap(long)]
        id: String,
    },
}

pub fn add_version(
    store: &Store,
    report_id: &str,
    input: VersionInput<'_>,
    now: DateTime<Utc>,
) -> Result<Version, error::SignoffError> {
    let repo = SqliteRepository::new(&store.root);
    let mut record = repo.load(report_id)?;
    let added = record.versions.add_version(input, now).clone();
    record.versions.verify_consistency()?;
    record.updated_at = now.to_rfc3339();
    repo.save(&record)?;
    Ok(added)
}

pub fn run_version_cli(
    store: &Store,
    default_actor: &str,
    cli: VersionCli,
) -> Result<(), error::SignoffError> {
    initialize_governance_db(&store.root)?;
    match cli.command {
        VersionCommand::Add {
            id,
            major,
            minor,
            patch,
            bump,
            kind,
            by,
            notes,
        } => {
            let by = by.unwrap_or_else(|| default_actor.to_string());
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            let (major, minor, patch) = match (bump, major, minor, patch) {
                (Some(bump_kind), _, _, _) => next_version(&record.versions, bump_kind),
                (None, Some(major), Some(minor), Some(patch)) => (major, minor, patch),
                _ => {
                    return Err(error::SignoffError::ValidationError(
                        "pass --bump or all of --major/--minor/--patch".to_string(),
                    ));
                }
            };
            let change_kind = bump.unwrap_or(kind);
            let added = add_version(
                store,
                &id,
                VersionInput {
                    major,
                    minor,
                    patch,
                    change_kind,
                    created_by: &by,
                    notes: notes.as_deref(),
                },
                Utc::now(),
            )?;
            println!(
                "{}",
                time::command_envelope(
                    "version.add",
                    "ok",
                    serde_json::json!({
                        "id": id,
                        "version": added.display(),
                        "change_kind": added.change_kind.as_str(),
                    })
                )
            );
        }
        VersionCommand::List { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record.versions.versions).unwrap()
            );
        }
        VersionCommand::Current { id } => {
            let repo = SqliteRepository::new(&store.root);
            let record = repo.load(&id)?;
            match record.versions.current() {
                Some(current) => {
                    println!("{}", serde_json::to_string_pretty(current).unwrap());
                }
                None => println!("No versions recorded for {}.", id),
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "version",
        "version": "0.1.0",
        "description": "Append-only version ledger with a single current pointer",
        "commands": [
            { "name": "add", "parameters": ["id", "major", "minor", "patch", "bump", "kind", "by", "notes"] },
            { "name": "list", "parameters": ["id"] },
            { "name": "current", "parameters": ["id"] }
        ],
        "storage": ["governance.db"]
    })
}
