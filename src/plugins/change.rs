//! Change-request subsystem: proposed report changes admitted through the
//! freeze gate at creation and approval time.

use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::repository::{governance_db_path, initialize_governance_db};
use crate::core::store::Store;
use crate::core::time;
use crate::core::version::{ChangeKind, ChangeRequest, ChangeRequestState};
use crate::plugins::freeze::load_freeze_window;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rusqlite::{params, OptionalExtension};
use ulid::Ulid;

#[derive(Parser, Debug)]
#[clap(name = "change", about = "Manage report change requests")]
pub struct ChangeCli {
    #[clap(subcommand)]
    pub command: ChangeCommand,
}

#[derive(Subcommand, Debug)]
pub enum ChangeCommand {
    /// File a change request (blocked during a freeze window).
    Request {
        #[clap(long)]
        id: String,
        #[clap(long, value_enum)]
        kind: ChangeKind,
        #[clap(long)]
        by: Option<String>,
        /// Planned implementation instant (RFC 3339).
        #[clap(long)]
        scheduled_for: Option<DateTime<Utc>>,
    },
    /// Approve a change request (blocked during a freeze window).
    Approve {
        #[clap(long)]
        request_id: String,
        #[clap(long)]
        actor: Option<String>,
    },
    /// Reject a change request.
    Reject {
        #[clap(long)]
        request_id: String,
        #[clap(long)]
        actor: Option<String>,
    },
    /// Mark an approved change request implemented.
    Implemented {
        #[clap(long)]
        request_id: String,
    },
    /// List change requests, optionally for one report.
    List {
        #[clap(long)]
        id: Option<String>,
    },
}

fn admit(store: &Store, now: DateTime<Utc>, what: &str) -> Result<(), error::SignoffError> {
    let freeze = load_freeze_window(store)?;
    if freeze.is_frozen(now) {
        return Err(error::SignoffError::ChangeFrozen(format!(
            "{} is blocked until {}",
            what,
            freeze.until_display()
        )));
    }
    Ok(())
}

pub fn request_change(
    store: &Store,
    report_id: &str,
    kind: ChangeKind,
    requested_by: &str,
    scheduled_for: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<String, error::SignoffError> {
    admit(store, now, "change-request creation")?;
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    let request_id = format!("CR_{}", Ulid::new());
    broker.with_conn(
        &db_path,
        requested_by,
        Some(report_id),
        "change.request",
        |conn| {
            conn.execute(
                "INSERT INTO change_requests(request_id, report_id, change_kind, requested_by,
                     state, requested_at, scheduled_for)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    request_id,
                    report_id,
                    kind.as_str(),
                    requested_by,
                    ChangeRequestState::Pending.as_str(),
                    now.to_rfc3339(),
                    scheduled_for.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        },
    )?;
    Ok(request_id)
}

pub fn decide_change(
    store: &Store,
    request_id: &str,
    approve: bool,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<(), error::SignoffError> {
    if approve {
        admit(store, now, "change-request approval")?;
    }
    let state = if approve {
        ChangeRequestState::Approved
    } else {
        ChangeRequestState::Rejected
    };
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    broker.with_conn(&db_path, actor, None, "change.decide", |conn| {
        let changed = conn.execute(
            "UPDATE change_requests
             SET state = ?1, decided_by = ?2, decided_at = ?3
             WHERE request_id = ?4 AND state = 'PENDING'",
            params![state.as_str(), actor, now.to_rfc3339(), request_id],
        )?;
        if changed == 0 {
            return Err(error::SignoffError::NotFound(format!(
                "pending change request {}",
                request_id
            )));
        }
        Ok(())
    })
}

pub fn mark_implemented(
    store: &Store,
    request_id: &str,
    now: DateTime<Utc>,
) -> Result<(), error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "change.implemented", |conn| {
        let changed = conn.execute(
            "UPDATE change_requests SET implemented_at = ?1
             WHERE request_id = ?2 AND state = 'APPROVED'",
            params![now.to_rfc3339(), request_id],
        )?;
        if changed == 0 {
            return Err(error::SignoffError::NotFound(format!(
                "approved change request {}",
                request_id
            )));
        }
        Ok(())
    })
}

pub fn list_changes(
    store: &Store,
    report_id: Option<&str>,
) -> Result<Vec<ChangeRequest>, error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", report_id, "change.list", |conn| {
        let mut query = "SELECT request_id, report_id, change_kind, requested_by, state,
                requested_at, scheduled_for, implemented_at, decided_by, decided_at
             FROM change_requests"
            .to_string();
        if report_id.is_some() {
            query.push_str(" WHERE report_id = ?1");
        }
        query.push_str(" ORDER BY requested_at");
        let mut stmt = conn.prepare(&query)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ChangeRequest> {
            Ok(ChangeRequest {
                request_id: row.get(0)?,
                report_id: row.get(1)?,
                change_kind: ChangeKind::from_kind_str(&row.get::<_, String>(2)?)
                    .unwrap_or(ChangeKind::Patch),
                requested_by: row.get(3)?,
                state: ChangeRequestState::from_state_str(&row.get::<_, String>(4)?),
                requested_at: row.get(5)?,
                scheduled_for: row.get(6)?,
                implemented_at: row.get(7)?,
                decided_by: row.get(8)?,
                decided_at: row.get(9)?,
            })
        };
        let mut out = Vec::new();
        if let Some(report_id) = report_id {
            let rows = stmt.query_map(params![report_id], map_row)?;
            for row in rows {
                out.push(row?);
            }
        } else {
            let rows = stmt.query_map([], map_row)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    })
}

pub fn get_change(store: &Store, request_id: &str) -> Result<ChangeRequest, error::SignoffError> {
    let broker = DbBroker::new(&store.root);
    let db_path = governance_db_path(&store.root);
    broker.with_conn(&db_path, "signoff", None, "change.get", |conn| {
        conn.query_row(
            "SELECT request_id, report_id, change_kind, requested_by, state,
                    requested_at, scheduled_for, implemented_at, decided_by, decided_at
             FROM change_requests WHERE request_id = ?1",
            params![request_id],
            |row| {
                Ok(ChangeRequest {
                    request_id: row.get(0)?,
                    report_id: row.get(1)?,
                    change_kind: ChangeKind::from_kind_str(&row.get::<_, String>(2)?)
                        .unwrap_or(ChangeKind::Patch),
                    requested_by: row.get(3)?,
                    state: ChangeRequestState::from_state_str(&row.get::<_, String>(4)?),
                    requested_at: row.get(5)?,
                    scheduled_for: row.get(6)?,
                    implemented_at: row.get(7)?,
                    decided_by: row.get(8)?,
                    decided_at: row.get(9)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| error::SignoffError::NotFound(format!("change request {}", request_id)))
    })
}

pub fn run_change_cli(
    store: &Store,
    default_actor: &str,
    cli: ChangeCli,
) -> Result<(), error::SignoffError> {
    initialize_governance_db(&store.root)?;
    match cli.command {
        ChangeCommand::Request {
            id,
            kind,
            by,
            scheduled_for,
        } => {
            let by = by.unwrap_or_else(|| default_actor.to_string());
            let request_id = request_change(store, &id, kind, &by, scheduled_for, Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "change.request",
                    "ok",
                    serde_json::json!({ "id": id, "request_id": request_id })
                )
            );
        }
        ChangeCommand::Approve { request_id, actor } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            decide_change(store, &request_id, true, &actor, Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "change.approve",
                    "ok",
                    serde_json::json!({ "request_id": request_id })
                )
            );
        }
        ChangeCommand::Reject { request_id, actor } => {
            let actor = actor.unwrap_or_else(|| default_actor.to_string());
            decide_change(store, &request_id, false, &actor, Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "change.reject",
                    "ok",
                    serde_json::json!({ "request_id": request_id })
                )
            );
        }
        ChangeCommand::Implemented { request_id } => {
            mark_implemented(store, &request_id, Utc::now())?;
            println!(
                "{}",
                time::command_envelope(
                    "change.implemented",
                    "ok",
                    serde_json::json!({ "request_id": request_id })
                )
            );
        }
        ChangeCommand::List { id } => {
            let requests = list_changes(store, id.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&requests).unwrap());
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "change",
        "version": "0.1.0",
        "description": "Change requests admitted through the freeze gate",
        "commands": [
            { "name": "request", "parameters": ["id", "kind", "by", "scheduled_for"] },
            { "name": "approve", "parameters": ["request_id", "actor"] },
            { "name": "reject", "parameters": ["request_id", "actor"] },
            { "name": "implemented", "parameters": ["request_id"] },
            { "name": "list", "parameters": ["id"] }
        ],
        "storage": ["governance.db"]
    })
}
