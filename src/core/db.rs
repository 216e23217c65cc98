use crate::core::error;
use rusqlite::Connection;

pub fn db_connect(db_path: &str) -> Result<Connection, error::SignoffError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::SignoffError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::SignoffError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::SignoffError::RusqliteError)?;
    Ok(conn)
}

// Subsystems own their schemas and initialization; see `crate::subsystems`.
