use crate::core::db;
use crate::core::error;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use ulid::Ulid;

/// The DB Broker is the single entry point for state mutation.
///
/// Every governance-aggregate mutation (stage transition, step decision,
/// version add, quality-check record, freeze toggle) and every schedule
/// mutation routes through `with_conn`, which serializes access and appends
/// an audit event to `broker.events.jsonl`.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub report_id: Option<String>,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join("broker.events.jsonl"),
        }
    }

    /// Execute a closure with a serialized connection to the specified DB.
    ///
    /// The in-process lock is coarser than the per-aggregate serialization the
    /// invariants require, which keeps the single-binary deployment simple; a
    /// finer lock keyed by report identity would also satisfy them.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        report_id: Option<&str>,
        op_name: &str,
        f: F,
    ) -> Result<R, error::SignoffError>
    where
        F: FnOnce(&Connection) -> Result<R, error::SignoffError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap();

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, report_id, op_name, &db_id, status)?;

        result
    }

    fn log_event(
        &self,
        actor: &str,
        report_id: Option<&str>,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::SignoffError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: crate::core::time::now_epoch_z(),
            event_id: Ulid::new().to_string(),
            actor: actor.to_string(),
            report_id: report_id.map(|s| s.to_string()),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::SignoffError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev).unwrap())
            .map_err(error::SignoffError::IoError)?;
        Ok(())
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "broker",
        "version": "0.1.0",
        "description": "State mutation broker and audit log",
        "commands": [
            { "name": "audit", "description": "Show the mutation audit log" }
        ],
        "storage": ["broker.events.jsonl"]
    })
}
