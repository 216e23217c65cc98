use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignoffError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid stage transition: {0}")]
    InvalidTransition(String),
    #[error("Approval required: {0}")]
    ApprovalRequired(String),
    #[error("Change freeze active: {0}")]
    ChangeFrozen(String),
    #[error("Malformed schedule: {0}")]
    MalformedSchedule(String),
    #[error("Version ledger inconsistency: {0}")]
    VersionConsistency(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
