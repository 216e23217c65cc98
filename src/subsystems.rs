//! Subsystem registration — centralizes all DB initialization functions.
//!
//! Adding a new subsystem: append one entry to `SUBSYSTEMS`.

use crate::core::{error, repository};
use crate::plugins::schedule;
use std::path::Path;

pub(crate) struct SubsystemInit {
    /// Subsystem identifier (used for diagnostics and future registry queries).
    #[allow(dead_code)]
    pub name: &'static str,
    pub initialize_db: fn(&Path) -> Result<(), error::SignoffError>,
}

/// All subsystems that require database initialization. Sequential execution
/// avoids SQLite contention during first start.
pub(crate) const SUBSYSTEMS: &[SubsystemInit] = &[
    SubsystemInit {
        name: "governance",
        initialize_db: repository::initialize_governance_db,
    },
    SubsystemInit {
        name: "schedule",
        initialize_db: schedule::initialize_schedule_db,
    },
];

/// Initialize all subsystem databases sequentially.
pub(crate) fn initialize_all_dbs(data_root: &Path) -> Result<(), error::SignoffError> {
    for sub in SUBSYSTEMS {
        (sub.initialize_db)(data_root)?;
    }
    Ok(())
}
