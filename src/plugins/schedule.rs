//! Schedule registry: recurring report jobs and their due-today checks.
//!
//! Rows live in `schedule.db`, one aggregate per schedule identity. The spec
//! columns are immutable once written; `replace` swaps the whole spec and
//! `set-status` flips only the lifecycle status (logical deletion included).
//! Due-checks go through the pure evaluator in `core::schedule`; CUSTOM_CRON
//! rows dispatch to the configured external evaluator command.

use crate::core::broker::DbBroker;
use crate::core::config::Config;
use crate::core::error;
use crate::core::schedule::{
    is_due_today, validate_spec, CronDelegate, DayOfWeek, Frequency, ScheduleSpec, ScheduleStatus,
};
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use ulid::Ulid;

pub fn schedule_db_path(root: &Path) -> PathBuf {
    root.join(schemas::SCHEDULE_DB_NAME)
}

pub fn initialize_schedule_db(root: &Path) -> Result<(), error::SignoffError> {
    std::fs::create_dir_all(root).map_err(error::SignoffError::IoError)?;
    let broker = DbBroker::new(root);
    let db_path = schedule_db_path(root);
    broker.with_conn(&db_path, "signoff", None, "schedule.init", |conn| {
        conn.execute(schemas::SCHEDULE_DB_SCHEMA, [])?;
        Ok(())
    })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleEntry {
    pub schedule_id: String,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub spec: ScheduleSpec,
    pub created_at: String,
    pub updated_at: String,
}

/// Cron evaluation delegated to an external command: invoked as
/// `<command> <expression> <date>`, exit code 0 means "due". Without a
/// configured command every cron row evaluates to not-due.
pub struct CommandCronDelegate {
    command: Option<String>,
}

impl CommandCronDelegate {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.cron_evaluator.clone(),
        }
    }
}

impl CronDelegate for CommandCronDelegate {
    fn is_due(&self, expression: &str, on: NaiveDate) -> bool {
        let Some(command) = self.command.as_deref() else {
            return false;
        };
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return false;
        };
        Command::new(program)
            .args(parts)
            .arg(expression)
            .arg(on.to_string())
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

#[derive(Parser, Debug)]
#[clap(name = "schedule", about = "Manage recurring report schedules")]
pub struct ScheduleCli {
    #[clap(subcommand)]
    pub command: ScheduleCommand,
}

#[derive(clap::Args, Debug)]
pub struct SpecArgs {
    #[clap(long, value_enum)]
    pub frequency: Frequency,
    /// DAILY cadence in days (omit for every day).
    #[clap(long)]
    pub interval_days: Option<u32>,
    /// WEEKLY due days, comma-separated (e.g. MONDAY,WEDNESDAY).
    #[clap(long, default_value = "")]
    pub days: String,
    /// MONTHLY due day; -1 means last day of the month.
    #[clap(long)]
    pub day_of_month: Option<i32>,
    /// CUSTOM_CRON expression (evaluated externally).
    #[clap(long)]
    pub cron: Option<String>,
    /// Inclusive window start (YYYY-MM-DD).
    #[clap(long)]
    pub start: Option<NaiveDate>,
    /// Inclusive window end (YYYY-MM-DD).
    #[clap(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Add a new schedule.
    Add {
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(flatten)]
        spec: SpecArgs,
    },
    /// Replace a schedule's spec wholesale (specs are immutable in place).
    Replace {
        #[clap(long)]
        id: String,
        #[clap(flatten)]
        spec: SpecArgs,
    },
    /// List schedules.
    List {
        #[clap(long, value_enum)]
        status: Option<ScheduleStatus>,
    },
    /// Retrieve a schedule by ID.
    Get {
        #[clap(long)]
        id: String,
    },
    /// Flip a schedule's status (ACTIVE/PAUSED/DISABLED/COMPLETED).
    SetStatus {
        #[clap(long)]
        id: String,
        #[clap(long, value_enum)]
        status: ScheduleStatus,
    },
    /// Evaluate whether schedules are due on a date.
    Check {
        #[clap(long)]
        id: Option<String>,
        /// Date to evaluate (defaults to today).
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Evaluate every schedule in the registry.
        #[clap(long)]
        all: bool,
    },
    /// Delete a schedule row outright.
    Delete {
        #[clap(long)]
        id: String,
    },
}

fn spec_from_args(args: &SpecArgs, status: ScheduleStatus) -> Result<ScheduleSpec, error::SignoffError> {
    let mut days = Vec::new();
    for raw in args.days.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let day = DayOfWeek::from_day_str(raw).ok_or_else(|| {
            error::SignoffError::MalformedSchedule(format!("unknown weekday '{}'", raw))
        })?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    let spec = ScheduleSpec {
        frequency: args.frequency,
        interval_days: args.interval_days,
        days_of_week: days,
        day_of_month: args.day_of_month,
        cron_expression: args.cron.clone(),
        start_date: args.start,
        end_date: args.end,
        status,
    };
    validate_spec(&spec)?;
    Ok(spec)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    let days_json: Option<String> = row.get(5)?;
    let days: Vec<DayOfWeek> = days_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    let start: Option<String> = row.get(8)?;
    let end: Option<String> = row.get(9)?;
    Ok(ScheduleEntry {
        schedule_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        spec: ScheduleSpec {
            frequency: Frequency::from_frequency_str(&row.get::<_, String>(3)?)
                .unwrap_or(Frequency::Daily),
            interval_days: row.get(4)?,
            days_of_week: days,
            day_of_month: row.get(6)?,
            cron_expression: row.get(7)?,
            start_date: start.as_deref().and_then(|d| d.parse().ok()),
            end_date: end.as_deref().and_then(|d| d.parse().ok()),
            status: ScheduleStatus::from_status_str(&row.get::<_, String>(10)?),
        },
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

const SELECT_COLUMNS: &str = "schedule_id, name, description, frequency, interval_days,
    days_of_week, day_of_month, cron_expression, start_date, end_date, status,
    created_at, updated_at";

fn insert_entry(
    conn: &Connection,
    entry: &ScheduleEntry,
) -> Result<(), error::SignoffError> {
    conn.execute(
        "INSERT OR REPLACE INTO schedules(schedule_id, name, description, frequency,
             interval_days, days_of_week, day_of_month, cron_expression, start_date,
             end_date, status, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            entry.schedule_id,
            entry.name,
            entry.description,
            entry.spec.frequency.as_str(),
            entry.spec.interval_days,
            serde_json::to_string(&entry.spec.days_of_week).unwrap(),
            entry.spec.day_of_month,
            entry.spec.cron_expression,
            entry.spec.start_date.map(|d| d.to_string()),
            entry.spec.end_date.map(|d| d.to_string()),
            entry.spec.status.as_str(),
            entry.created_at,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

pub fn add_schedule(
    store: &Store,
    name: &str,
    description: &str,
    spec: ScheduleSpec,
) -> Result<String, error::SignoffError> {
    validate_spec(&spec)?;
    let broker = DbBroker::new(&store.root);
    let db_path = schedule_db_path(&store.root);
    let schedule_id = format!("SCH_{}", Ulid::new());
    let now = time::now_epoch_z();
    let entry = ScheduleEntry {
        schedule_id: schedule_id.clone(),
        name: name.to_string(),
        description: description.to_string(),
        spec,
        created_at: now.clone(),
        updated_at: now,
    };
    broker.with_conn(&db_path, "signoff", None, "schedule.add", |conn| {
        insert_entry(conn, &entry)
    })?;
    Ok(schedule_id)
}

/// Wholesale spec replacement; name/description and creation metadata stay.
pub fn replace_schedule(
    store: &Store,
    id: &str,
    spec: ScheduleSpec,
) -> Result<(), error::SignoffError> {
    validate_spec(&spec)?;
    let existing = get_schedule(store, id)?;
    let broker = DbBroker::new(&store.root);
    let db_path = schedule_db_path(&store.root);
    let entry = ScheduleEntry {
        spec,
        updated_at: time::now_epoch_z(),
        ..existing
    };
    broker.with_conn(&db_path, "signoff", None, "schedule.replace", |conn| {
        insert_entry(conn, &entry)
    })
}

pub fn get_schedule(store: &Store, id: &str) -> Result<ScheduleEntry, error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = schedule_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "schedule.get", |conn| {
        conn.query_row(
            &format!("SELECT {} FROM schedules WHERE schedule_id = ?1", SELECT_COLUMNS),
            params![id],
            |row| row_to_entry(row),
        )
        .optional()?
        .ok_or_else(|| error::SignoffError::NotFound(format!("schedule {}", id)))
    })
}

pub fn list_schedules(
    store: &Store,
    status: Option<ScheduleStatus>,
) -> Result<Vec<ScheduleEntry>, error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = schedule_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "schedule.list", |conn| {
        let mut query = format!("SELECT {} FROM schedules", SELECT_COLUMNS);
        if status.is_some() {
            query.push_str(" WHERE status = ?1");
        }
        query.push_str(" ORDER BY created_at");
        let mut stmt = conn.prepare(&query)?;
        let mut out = Vec::new();
        if let Some(status) = status {
            let rows = stmt.query_map(params![status.as_str()], |row| row_to_entry(row))?;
            for row in rows {
                out.push(row?);
            }
        } else {
            let rows = stmt.query_map([], |row| row_to_entry(row))?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    })
}

pub fn set_schedule_status(
    store: &Store,
    id: &str,
    status: ScheduleStatus,
) -> Result<(), error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = schedule_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "schedule.set_status", |conn| {
        let changed = conn.execute(
            "UPDATE schedules SET status = ?1, updated_at = ?2 WHERE schedule_id = ?3",
            params![status.as_str(), time::now_epoch_z(), id],
        )?;
        if changed == 0 {
            return Err(error::SignoffError::NotFound(format!("schedule {}", id)));
        }
        Ok(())
    })
}

pub fn delete_schedule(store: &Store, id: &str) -> Result<(), error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = schedule_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "schedule.delete", |conn| {
        conn.execute("DELETE FROM schedules WHERE schedule_id = ?1", params![id])?;
        Ok(())
    })
}

pub fn check_schedule(
    store: &Store,
    id: &str,
    date: NaiveDate,
    cron: &dyn CronDelegate,
) -> Result<bool, error::SignoffError> {
    let entry = get_schedule(store, id)?;
    Ok(is_due_today(&entry.spec, date, cron))
}

/// Evaluate the whole registry for one date. The evaluator is pure, so the
/// sweep fans out across threads with no synchronization.
pub fn check_all_schedules(
    store: &Store,
    date: NaiveDate,
    cron: &(dyn CronDelegate + Sync),
) -> Result<Vec<(ScheduleEntry, bool)>, error::SignoffError> {
    let entries = list_schedules(store, None)?;
    Ok(entries
        .into_par_iter()
        .map(|entry| {
            let due = is_due_today(&entry.spec, date, cron);
            (entry, due)
        })
        .collect())
}

pub fn run_schedule_cli(
    store: &Store,
    config: &Config,
    cli: ScheduleCli,
) -> Result<(), error::SignoffError> {
    initialize_schedule_db(&store.root)?;
    match cli.command {
        ScheduleCommand::Add {
            name,
            description,
            spec,
        } => {
            let spec = spec_from_args(&spec, ScheduleStatus::Active)?;
            let id = add_schedule(store, &name, &description, spec)?;
            println!(
                "{}",
                time::command_envelope("schedule.add", "ok", serde_json::json!({ "id": id }))
            );
        }
        ScheduleCommand::Replace { id, spec } => {
            let spec = spec_from_args(&spec, ScheduleStatus::Active)?;
            replace_schedule(store, &id, spec)?;
            println!(
                "{}",
                time::command_envelope("schedule.replace", "ok", serde_json::json!({ "id": id }))
            );
        }
        ScheduleCommand::List { status } => {
            let entries = list_schedules(store, status)?;
            println!("{}", serde_json::to_string_pretty(&entries).unwrap());
        }
        ScheduleCommand::Get { id } => {
            let entry = get_schedule(store, &id)?;
            println!("{}", serde_json::to_string_pretty(&entry).unwrap());
        }
        ScheduleCommand::SetStatus { id, status } => {
            set_schedule_status(store, &id, status)?;
            println!(
                "{}",
                time::command_envelope(
                    "schedule.set_status",
                    "ok",
                    serde_json::json!({ "id": id, "status": status.as_str() })
                )
            );
        }
        ScheduleCommand::Check { id, date, all } => {
            let date = date.unwrap_or_else(|| {
                use crate::core::time::{Clock, SystemClock};
                SystemClock.today()
            });
            let cron = CommandCronDelegate::from_config(config);
            if all {
                let results = check_all_schedules(store, date, &cron)?;
                let due: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(entry, due)| {
                        serde_json::json!({
                            "id": entry.schedule_id,
                            "name": entry.name,
                            "due": due,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    time::command_envelope(
                        "schedule.check",
                        "ok",
                        serde_json::json!({ "date": date.to_string(), "schedules": due })
                    )
                );
            } else {
                let id = id.ok_or_else(|| {
                    error::SignoffError::ValidationError(
                        "pass --id or --all to schedule check".to_string(),
                    )
                })?;
                let due = check_schedule(store, &id, date, &cron)?;
                println!(
                    "{}",
                    time::command_envelope(
                        "schedule.check",
                        "ok",
                        serde_json::json!({ "id": id, "date": date.to_string(), "due": due })
                    )
                );
            }
        }
        ScheduleCommand::Delete { id } => {
            delete_schedule(store, &id)?;
            println!(
                "{}",
                time::command_envelope("schedule.delete", "ok", serde_json::json!({ "id": id }))
            );
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "schedule",
        "version": "0.1.0",
        "description": "Recurring report schedules and due-today evaluation",
        "commands": [
            { "name": "add", "parameters": ["name", "frequency", "interval_days", "days", "day_of_month", "cron", "start", "end"] },
            { "name": "replace", "parameters": ["id"] },
            { "name": "list", "parameters": ["status"] },
            { "name": "get", "parameters": ["id"] },
            { "name": "set-status", "parameters": ["id", "status"] },
            { "name": "check", "parameters": ["id", "date", "all"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["schedule.db"]
    })
}
