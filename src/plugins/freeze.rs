//! Change-freeze subsystem: the external governance action that sets the
//! freeze window consulted by every governance mutation.

use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::freeze::FreezeWindow;
use crate::core::repository::governance_db_path;
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rusqlite::{params, OptionalExtension};

#[derive(Parser, Debug)]
#[clap(name = "freeze", about = "Manage the change-freeze window")]
pub struct FreezeCli {
    #[clap(subcommand)]
    pub command: FreezeCommand,
}

#[derive(Subcommand, Debug)]
pub enum FreezeCommand {
    /// Activate a freeze window until the given instant (RFC 3339).
    Activate {
        #[clap(long)]
        until: DateTime<Utc>,
        #[clap(long)]
        actor: Option<String>,
    },
    /// Deactivate the freeze window.
    Deactivate {
        #[clap(long)]
        actor: Option<String>,
    },
    /// Show the freeze window state.
    Status,
}

pub fn load_freeze_window(store: &Store) -> Result<FreezeWindow, error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "freeze.load", |conn| {
        let row: Option<(bool, Option<String>)> = conn
            .query_row(
                "SELECT active, until FROM freeze_window WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((active, until)) = row else {
            return Ok(FreezeWindow::inactive());
        };
        Ok(FreezeWindow {
            active,
            until: until
                .as_deref()
                .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
                .map(|u| u.with_timezone(&Utc)),
        })
    })
}

pub fn activate_freeze(
    store: &Store,
    until: DateTime<Utc>,
    actor: &str,
) -> Result<(), error::SignoffError> {
    write_window(store, true, Some(until), actor, "freeze.activate")
}

pub fn deactivate_freeze(store: &Store, actor: &str) -> Result<(), error::SignoffError> {
    write_window(store, false, None, actor, "freeze.deactivate")
}

fn write_window(
    store: &Store,
    active: bool,
    until: Option<DateTime<Utc>>,
    actor: &str,
    op: &str,
) -> Result<(), error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    broker.with_conn(&db_path, actor, None, op, |conn| {
        conn.execute(
            "INSERT INTO freeze_window(id, active, until, updated_at, updated_by)
             VALUES(1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 active = excluded.active,
                 until = excluded.until,
                 updated_at = excluded.updated_at,
                 updated_by = excluded.updated_by",
            params![
                active,
                until.map(|u| u.to_rfc3339()),
                time::now_epoch_z(),
                actor
            ],
        )?;
        Ok(())
    })
}

pub fn run_freeze_cli(
    store: &Store,
    default_actor: &str,
    cli: FreezeCli,
) -> Result<(), error::SignoffError> {
    match cli.command {
        FreezeCommand::Activate { until, actor } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            activate_freeze(store, until, &actor)?;
            println!(
                "{}",
                time::command_envelope(
                    "freeze.activate",
                    "ok",
                    serde_json::json!({ "until": until.to_rfc3339(), "actor": actor })
                )
            );
        }
        FreezeCommand::Deactivate { actor } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            deactivate_freeze(store, &actor)?;
            println!(
                "{}",
                time::command_envelope("freeze.deactivate", "ok", serde_json::json!({ "actor": actor }))
            );
        }
        FreezeCommand::Status => {
            let window = load_freeze_window(store)?;
            let now = Utc::now();
            if window.is_frozen(now) {
                println!(
                    "{} until {}",
                    "FROZEN".bright_red().bold(),
                    window.until_display().bright_white()
                );
            } else {
                println!("{}", "THAWED".bright_green().bold());
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "freeze",
        "version": "0.1.0",
        "description": "Change-freeze window gating governance mutations",
        "commands": [
            { "name": "activate", "parameters": ["until", "actor"] },
            { "name": "deactivate", "parameters": ["actor"] },
            { "name": "status", "parameters": [] }
        ],
        "storage": ["governance.db"]
    })
}
