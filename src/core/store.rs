//! Store abstraction for Signoff's state management.
//!
//! A store is the project-scoped workspace under `.signoff/data/` that holds
//! the governance and schedule databases plus the append-only event ledgers.
//! All subsystem state is scoped to a store; two stores are fully independent.

use std::path::PathBuf;

/// Store handle representing a Signoff state workspace.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}
