//! SQLite adapter for the governance aggregate plus the JSONL audit sink.
//!
//! `SqliteRepository` loads and saves whole aggregates through the broker.
//! Saves run inside a single transaction so the persisted state is as
//! all-or-nothing as the in-memory mutation. Loads re-verify the structural
//! invariants (one current version, history matches stage) and fail loudly
//! when the store is corrupt.

use crate::core::approval::{ApprovalStep, StepStatus, Workflow};
use crate::core::broker::DbBroker;
use crate::core::error::SignoffError;
use crate::core::governance::{AuditSink, GovernanceRecord, Repository};
use crate::core::lifecycle::{DeprecationInfo, LifecycleRecord, Stage, StageTransition};
use crate::core::quality::{CheckSeverity, QualityCheck, QualityGate};
use crate::core::schemas;
use crate::core::version::{ChangeKind, Version, VersionLedger};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub fn governance_db_path(root: &Path) -> PathBuf {
    root.join(schemas::GOVERNANCE_DB_NAME)
}

pub fn lifecycle_events_path(root: &Path) -> PathBuf {
    root.join(schemas::LIFECYCLE_EVENTS_NAME)
}

pub struct SqliteRepository {
    root: PathBuf,
    db_path: PathBuf,
}

impl SqliteRepository {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            db_path: governance_db_path(root),
        }
    }

    pub fn exists(&self, report_id: &str) -> Result<bool, SignoffError> {
        let broker = DbBroker::new(&self.root);
        broker.with_conn(
            &self.db_path,
            "signoff",
            Some(report_id),
            "governance.exists",
            |conn| {
                let hit: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM reports WHERE report_id = ?1",
                        params![report_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(hit.is_some())
            },
        )
    }

    pub fn list_report_ids(&self) -> Result<Vec<String>, SignoffError> {
        let broker = DbBroker::new(&self.root);
        broker.with_conn(&self.db_path, "signoff", None, "governance.list", |conn| {
            let mut stmt = conn.prepare("SELECT report_id FROM reports ORDER BY report_id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    fn load_record(conn: &Connection, report_id: &str) -> Result<GovernanceRecord, SignoffError> {
        struct ReportRow {
            current_stage: Option<String>,
            previous_stage: Option<String>,
            stage_changed_at: Option<String>,
            stage_changed_by: Option<String>,
            deprecation_reason: Option<String>,
            replacement_ref: Option<String>,
            retirement_date: Option<String>,
            created_at: String,
            updated_at: String,
        }

        let row: ReportRow = conn
            .query_row(
                "SELECT current_stage, previous_stage, stage_changed_at, stage_changed_by,
                        deprecation_reason, replacement_ref, retirement_date, created_at, updated_at
                 FROM reports WHERE report_id = ?1",
                params![report_id],
                |row| {
                    Ok(ReportRow {
                        current_stage: row.get(0)?,
                        previous_stage: row.get(1)?,
                        stage_changed_at: row.get(2)?,
                        stage_changed_by: row.get(3)?,
                        deprecation_reason: row.get(4)?,
                        replacement_ref: row.get(5)?,
                        retirement_date: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| SignoffError::NotFound(format!("report {}", report_id)))?;

        let mut history = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT event_id, from_stage, to_stage, ts, actor, reason
             FROM stage_transitions WHERE report_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![report_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        for row in rows {
            let (event_id, from, to, ts, actor, reason) = row?;
            history.push(StageTransition {
                event_id,
                from: from.as_deref().and_then(Stage::from_stage_str),
                to: Stage::from_stage_str(&to).ok_or_else(|| {
                    SignoffError::ValidationError(format!("unknown stage '{}' in history", to))
                })?,
                ts,
                actor,
                reason,
            });
        }

        let mut steps = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT step_id, position, approver, required, status, created_at,
                    decided_at, decided_by, comment
             FROM approval_steps WHERE report_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![report_id], |row| {
            Ok(ApprovalStep {
                step_id: row.get(0)?,
                position: row.get(1)?,
                approver: row.get(2)?,
                required: row.get(3)?,
                status: StepStatus::from_status_str(&row.get::<_, String>(4)?),
                created_at: row.get(5)?,
                decided_at: row.get(6)?,
                decided_by: row.get(7)?,
                comment: row.get(8)?,
            })
        })?;
        for row in rows {
            steps.push(row?);
        }

        let mut versions = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT version_id, major, minor, patch, change_kind, created_at, created_by,
                    notes, is_current
             FROM versions WHERE report_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![report_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, bool>(8)?,
            ))
        })?;
        for row in rows {
            let (version_id, major, minor, patch, kind, created_at, created_by, notes, current) =
                row?;
            versions.push(Version {
                version_id,
                major,
                minor,
                patch,
                change_kind: ChangeKind::from_kind_str(&kind).ok_or_else(|| {
                    SignoffError::ValidationError(format!("unknown change kind '{}'", kind))
                })?,
                created_at,
                created_by,
                notes,
                current,
            });
        }

        let mut checks = Vec::new();
        let mut failed_count = 0u32;
        let mut stmt = conn.prepare(
            "SELECT check_id, name, passed, severity, score, recorded_at
             FROM quality_checks WHERE report_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![report_id], |row| {
            Ok(QualityCheck {
                check_id: row.get(0)?,
                name: row.get(1)?,
                passed: row.get(2)?,
                severity: CheckSeverity::from_severity_str(&row.get::<_, String>(3)?),
                score: row.get(4)?,
                recorded_at: row.get(5)?,
            })
        })?;
        for row in rows {
            let check = row?;
            if !check.passed {
                failed_count += 1;
            }
            checks.push(check);
        }

        let deprecation = row.deprecation_reason.map(|reason| DeprecationInfo {
            reason,
            replacement: row.replacement_ref,
            retirement_date: row
                .retirement_date
                .as_deref()
                .and_then(|d| d.parse().ok()),
        });

        let lifecycle = LifecycleRecord {
            current: row.current_stage.as_deref().and_then(Stage::from_stage_str),
            previous: row
                .previous_stage
                .as_deref()
                .and_then(Stage::from_stage_str),
            changed_at: row.stage_changed_at,
            changed_by: row.stage_changed_by,
            history,
            deprecation,
        };

        let mut ledger = VersionLedger {
            versions,
            ..VersionLedger::default()
        };
        if let Some(current) = ledger.versions.iter().find(|v| v.current) {
            ledger.current_major = current.major;
            ledger.current_minor = current.minor;
            ledger.current_patch = current.patch;
            ledger.current_display = current.display();
        }

        let record = GovernanceRecord {
            report_id: report_id.to_string(),
            lifecycle,
            workflow: Workflow { steps },
            versions: ledger,
            quality: QualityGate {
                checks,
                failed_count,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        };

        record.lifecycle.verify()?;
        record.versions.verify_consistency()?;
        Ok(record)
    }

    fn save_record(conn: &Connection, record: &GovernanceRecord) -> Result<(), SignoffError> {
        let tx = conn.unchecked_transaction()?;

        let (dep_reason, dep_replacement, dep_retirement) = match &record.lifecycle.deprecation {
            Some(info) => (
                Some(info.reason.clone()),
                info.replacement.clone(),
                info.retirement_date.map(|d| d.to_string()),
            ),
            None => (None, None, None),
        };

        tx.execute(
            "INSERT INTO reports(report_id, current_stage, previous_stage, stage_changed_at,
                                 stage_changed_by, deprecation_reason, replacement_ref,
                                 retirement_date, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(report_id) DO UPDATE SET
                 current_stage = excluded.current_stage,
                 previous_stage = excluded.previous_stage,
                 stage_changed_at = excluded.stage_changed_at,
                 stage_changed_by = excluded.stage_changed_by,
                 deprecation_reason = excluded.deprecation_reason,
                 replacement_ref = excluded.replacement_ref,
                 retirement_date = excluded.retirement_date,
                 updated_at = excluded.updated_at",
            params![
                record.report_id,
                record.lifecycle.current.map(|s| s.as_str()),
                record.lifecycle.previous.map(|s| s.as_str()),
                record.lifecycle.changed_at,
                record.lifecycle.changed_by,
                dep_reason,
                dep_replacement,
                dep_retirement,
                record.created_at,
                record.updated_at,
            ],
        )?;

        tx.execute(
            "DELETE FROM stage_transitions WHERE report_id = ?1",
            params![record.report_id],
        )?;
        for (seq, t) in record.lifecycle.history.iter().enumerate() {
            tx.execute(
                "INSERT INTO stage_transitions(event_id, report_id, seq, from_stage, to_stage,
                                               ts, actor, reason)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    t.event_id,
                    record.report_id,
                    seq as i64,
                    t.from.map(|s| s.as_str()),
                    t.to.as_str(),
                    t.ts,
                    t.actor,
                    t.reason,
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM approval_steps WHERE report_id = ?1",
            params![record.report_id],
        )?;
        for step in &record.workflow.steps {
            tx.execute(
                "INSERT INTO approval_steps(step_id, report_id, position, approver, required,
                                            status, created_at, decided_at, decided_by, comment)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    step.step_id,
                    record.report_id,
                    step.position,
                    step.approver,
                    step.required,
                    step.status.as_str(),
                    step.created_at,
                    step.decided_at,
                    step.decided_by,
                    step.comment,
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM versions WHERE report_id = ?1",
            params![record.report_id],
        )?;
        for (seq, v) in record.versions.versions.iter().enumerate() {
            tx.execute(
                "INSERT INTO versions(version_id, report_id, seq, major, minor, patch,
                                      change_kind, created_at, created_by, notes, is_current)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    v.version_id,
                    record.report_id,
                    seq as i64,
                    v.major,
                    v.minor,
                    v.patch,
                    v.change_kind.as_str(),
                    v.created_at,
                    v.created_by,
                    v.notes,
                    v.current,
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM quality_checks WHERE report_id = ?1",
            params![record.report_id],
        )?;
        for (seq, c) in record.quality.checks.iter().enumerate() {
            tx.execute(
                "INSERT INTO quality_checks(check_id, report_id, seq, name, passed, severity,
                                            score, recorded_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    c.check_id,
                    record.report_id,
                    seq as i64,
                    c.name,
                    c.passed,
                    c.severity.as_str(),
                    c.score,
                    c.recorded_at,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl Repository for SqliteRepository {
    fn load(&self, report_id: &str) -> Result<GovernanceRecord, SignoffError> {
        let broker = DbBroker::new(&self.root);
        broker.with_conn(
            &self.db_path,
            "signoff",
            Some(report_id),
            "governance.load",
            |conn| Self::load_record(conn, report_id),
        )
    }

    fn save(&self, record: &GovernanceRecord) -> Result<(), SignoffError> {
        let broker = DbBroker::new(&self.root);
        broker.with_conn(
            &self.db_path,
            "signoff",
            Some(&record.report_id),
            "governance.save",
            |conn| Self::save_record(conn, record),
        )
    }
}

// ---------------------------------------------------------------------------
// Audit ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditEvent {
    pub ts: String,
    pub event_id: String,
    pub report_id: String,
    pub from: Option<String>,
    pub to: String,
    pub actor: String,
    pub reason: String,
    pub content_hash: String,
}

fn audit_content_hash(report_id: &str, transition: &StageTransition) -> String {
    let mut hasher = Sha256::new();
    hasher.update(report_id.as_bytes());
    hasher.update(b"|");
    hasher.update(transition.from.map(|s| s.as_str()).unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(transition.to.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(transition.ts.as_bytes());
    hasher.update(b"|");
    hasher.update(transition.actor.as_bytes());
    hasher.update(b"|");
    hasher.update(transition.reason.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Append-only JSONL sink for committed stage transitions. Write failures are
/// swallowed: the transition has already committed and the ledger is a
/// derived record, rebuildable from `stage_transitions`.
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(root: &Path) -> Self {
        Self {
            path: lifecycle_events_path(root),
        }
    }
}

impl AuditSink for JsonlAuditSink {
    fn record_transition(&self, report_id: &str, transition: &StageTransition) {
        let event = AuditEvent {
            ts: transition.ts.clone(),
            event_id: transition.event_id.clone(),
            report_id: report_id.to_string(),
            from: transition.from.map(|s| s.as_str().to_string()),
            to: transition.to.as_str().to_string(),
            actor: transition.actor.clone(),
            reason: transition.reason.clone(),
            content_hash: audit_content_hash(report_id, transition),
        };
        let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) else {
            return;
        };
        let _ = writeln!(f, "{}", serde_json::to_string(&event).unwrap());
    }
}

pub fn read_audit_events(root: &Path) -> Result<Vec<AuditEvent>, SignoffError> {
    let path = lifecycle_events_path(root);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(&path).map_err(SignoffError::IoError)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(SignoffError::IoError)?;
        if line.trim().is_empty() {
            continue;
        }
        let event: AuditEvent = serde_json::from_str(line.trim())
            .map_err(|e| SignoffError::ValidationError(e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}

/// Recompute every entry's content hash; returns the event ids that fail.
pub fn validate_audit_ledger(root: &Path) -> Result<Vec<String>, SignoffError> {
    let events = read_audit_events(root)?;
    let mut failures = Vec::new();
    for event in events {
        let transition = StageTransition {
            event_id: event.event_id.clone(),
            from: event.from.as_deref().and_then(Stage::from_stage_str),
            to: match Stage::from_stage_str(&event.to) {
                Some(stage) => stage,
                None => {
                    failures.push(event.event_id);
                    continue;
                }
            },
            ts: event.ts.clone(),
            actor: event.actor.clone(),
            reason: event.reason.clone(),
        };
        if audit_content_hash(&event.report_id, &transition) != event.content_hash {
            failures.push(event.event_id);
        }
    }
    Ok(failures)
}

pub fn initialize_governance_db(root: &Path) -> Result<(), SignoffError> {
    std::fs::create_dir_all(root).map_err(SignoffError::IoError)?;
    let broker = DbBroker::new(root);
    let db_path = governance_db_path(root);
    broker.with_conn(&db_path, "signoff", None, "governance.init", |conn| {
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_REPORTS, [])?;
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_STAGE_TRANSITIONS, [])?;
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_APPROVAL_STEPS, [])?;
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_VERSIONS, [])?;
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_QUALITY_CHECKS, [])?;
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_CHANGE_REQUESTS, [])?;
        conn.execute(schemas::GOVERNANCE_DB_SCHEMA_FREEZE_WINDOW, [])?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::governance::TransitionInput;
    use crate::core::freeze::FreezeWindow;
    use crate::core::version::{ChangeKind, VersionInput};
    use chrono::{TimeZone, Utc};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn round_trip_preserves_the_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        initialize_governance_db(dir.path()).unwrap();
        let repo = SqliteRepository::new(dir.path());

        let mut record = GovernanceRecord::new("RPT-7", now());
        record
            .transition(
                TransitionInput {
                    to: Stage::Draft,
                    actor: "alice",
                    reason: "created",
                    deprecation: None,
                },
                &FreezeWindow::inactive(),
                now(),
            )
            .unwrap();
        record.workflow.add_step("bob", true, now());
        record.versions.add_version(
            VersionInput {
                major: 1,
                minor: 0,
                patch: 0,
                change_kind: ChangeKind::Major,
                created_by: "alice",
                notes: Some("initial"),
            },
            now(),
        );
        record
            .quality
            .record_check("row-count", true, crate::core::quality::CheckSeverity::Low, 1.0, now());
        repo.save(&record).unwrap();

        let loaded = repo.load("RPT-7").unwrap();
        assert_eq!(loaded.lifecycle.current, Some(Stage::Draft));
        assert_eq!(loaded.lifecycle.history.len(), 1);
        assert_eq!(loaded.workflow.steps.len(), 1);
        assert_eq!(loaded.versions.current_display, "v1.0.0");
        assert_eq!(loaded.quality.checks.len(), 1);
        assert_eq!(loaded.quality.failed_count, 0);
    }

    #[test]
    fn load_missing_report_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        initialize_governance_db(dir.path()).unwrap();
        let repo = SqliteRepository::new(dir.path());
        assert!(matches!(
            repo.load("RPT-404"),
            Err(SignoffError::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_current_flags_fail_the_load() {
        let dir = tempfile::tempdir().unwrap();
        initialize_governance_db(dir.path()).unwrap();
        let repo = SqliteRepository::new(dir.path());

        let mut record = GovernanceRecord::new("RPT-8", now());
        record.versions.add_version(
            VersionInput {
                major: 1,
                minor: 0,
                patch: 0,
                change_kind: ChangeKind::Major,
                created_by: "alice",
                notes: None,
            },
            now(),
        );
        record.versions.add_version(
            VersionInput {
                major: 1,
                minor: 1,
                patch: 0,
                change_kind: ChangeKind::Minor,
                created_by: "alice",
                notes: None,
            },
            now(),
        );
        repo.save(&record).unwrap();

        // Corrupt the store directly: flag both rows current.
        let conn = crate::core::db::db_connect(
            &governance_db_path(dir.path()).to_string_lossy(),
        )
        .unwrap();
        conn.execute("UPDATE versions SET is_current = 1", []).unwrap();

        assert!(matches!(
            repo.load("RPT-8"),
            Err(SignoffError::VersionConsistency(_))
        ));
    }

    #[test]
    fn audit_ledger_hashes_verify_and_detect_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path());
        let transition = StageTransition {
            event_id: crate::core::time::new_event_id(),
            from: None,
            to: Stage::Draft,
            ts: now().to_rfc3339(),
            actor: "alice".to_string(),
            reason: "created".to_string(),
        };
        sink.record_transition("RPT-9", &transition);

        assert!(validate_audit_ledger(dir.path()).unwrap().is_empty());

        // Tamper with the reason field.
        let path = lifecycle_events_path(dir.path());
        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("created", "innocuous");
        std::fs::write(&path, tampered).unwrap();

        let failures = validate_audit_ledger(dir.path()).unwrap();
        assert_eq!(failures.len(), 1);
    }
}
