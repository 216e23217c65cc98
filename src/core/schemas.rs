//! Centralized database schema definitions for the Signoff state bins.
//!
//! Signoff uses two consolidated SQLite databases:
//! 1. governance.db: report lifecycle, approvals, versions, quality checks,
//!    change requests, and the freeze window.
//! 2. schedule.db: recurring report schedules.

// --- 1. Governance Bin ---
pub const GOVERNANCE_DB_NAME: &str = "governance.db";
pub const LIFECYCLE_EVENTS_NAME: &str = "lifecycle.events.jsonl";

pub const GOVERNANCE_DB_SCHEMA_REPORTS: &str = "
    CREATE TABLE IF NOT EXISTS reports (
        report_id TEXT PRIMARY KEY,
        current_stage TEXT,
        previous_stage TEXT,
        stage_changed_at TEXT,
        stage_changed_by TEXT,
        deprecation_reason TEXT,
        replacement_ref TEXT,
        retirement_date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const GOVERNANCE_DB_SCHEMA_STAGE_TRANSITIONS: &str = "
    CREATE TABLE IF NOT EXISTS stage_transitions (
        event_id TEXT PRIMARY KEY,
        report_id TEXT NOT NULL,
        seq INTEGER NOT NULL,
        from_stage TEXT,
        to_stage TEXT NOT NULL,
        ts TEXT NOT NULL,
        actor TEXT NOT NULL,
        reason TEXT NOT NULL,
        UNIQUE(report_id, seq),
        FOREIGN KEY(report_id) REFERENCES reports(report_id) ON DELETE CASCADE
    )
";

pub const GOVERNANCE_DB_SCHEMA_APPROVAL_STEPS: &str = "
    CREATE TABLE IF NOT EXISTS approval_steps (
        step_id TEXT PRIMARY KEY,
        report_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        approver TEXT NOT NULL,
        required INTEGER NOT NULL DEFAULT 1,
        status TEXT NOT NULL DEFAULT 'PENDING',
        created_at TEXT NOT NULL,
        decided_at TEXT,
        decided_by TEXT,
        comment TEXT,
        UNIQUE(report_id, position),
        FOREIGN KEY(report_id) REFERENCES reports(report_id) ON DELETE CASCADE
    )
";

pub const GOVERNANCE_DB_SCHEMA_VERSIONS: &str = "
    CREATE TABLE IF NOT EXISTS versions (
        version_id TEXT PRIMARY KEY,
        report_id TEXT NOT NULL,
        seq INTEGER NOT NULL,
        major INTEGER NOT NULL,
        minor INTEGER NOT NULL,
        patch INTEGER NOT NULL,
        change_kind TEXT NOT NULL,
        created_at TEXT NOT NULL,
        created_by TEXT NOT NULL,
        notes TEXT,
        is_current INTEGER NOT NULL DEFAULT 0,
        UNIQUE(report_id, seq),
        FOREIGN KEY(report_id) REFERENCES reports(report_id) ON DELETE CASCADE
    )
";

pub const GOVERNANCE_DB_SCHEMA_QUALITY_CHECKS: &str = "
    CREATE TABLE IF NOT EXISTS quality_checks (
        check_id TEXT PRIMARY KEY,
        report_id TEXT NOT NULL,
        seq INTEGER NOT NULL,
        name TEXT NOT NULL,
        passed INTEGER NOT NULL,
        severity TEXT NOT NULL,
        score REAL NOT NULL,
        recorded_at TEXT NOT NULL,
        UNIQUE(report_id, seq),
        FOREIGN KEY(report_id) REFERENCES reports(report_id) ON DELETE CASCADE
    )
";

pub const GOVERNANCE_DB_SCHEMA_CHANGE_REQUESTS: &str = "
    CREATE TABLE IF NOT EXISTS change_requests (
        request_id TEXT PRIMARY KEY,
        report_id TEXT NOT NULL,
        change_kind TEXT NOT NULL,
        requested_by TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'PENDING',
        requested_at TEXT NOT NULL,
        scheduled_for TEXT,
        implemented_at TEXT,
        decided_by TEXT,
        decided_at TEXT
    )
";

// Single control row; id is pinned to 1.
pub const GOVERNANCE_DB_SCHEMA_FREEZE_WINDOW: &str = "
    CREATE TABLE IF NOT EXISTS freeze_window (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        active INTEGER NOT NULL DEFAULT 0,
        until TEXT,
        updated_at TEXT NOT NULL,
        updated_by TEXT NOT NULL
    )
";

// --- 2. Schedule Bin ---
pub const SCHEDULE_DB_NAME: &str = "schedule.db";

pub const SCHEDULE_DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS schedules (
        schedule_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        frequency TEXT NOT NULL,
        interval_days INTEGER,
        days_of_week TEXT, -- JSON array of weekday names
        day_of_month INTEGER, -- -1 means last day of month
        cron_expression TEXT,
        start_date TEXT,
        end_date TEXT,
        status TEXT NOT NULL DEFAULT 'ACTIVE',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";
