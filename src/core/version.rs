//! Version ledger: the append-only set of report versions with a single
//! "current" pointer, plus change requests that feed it.
//!
//! The ledger records what it is given; bump arithmetic is the caller's
//! decision (`next_version` is a convenience for that caller, never applied
//! implicitly). The invariant "exactly one current version" must hold at all
//! times once the ledger is non-empty.

use crate::core::error::SignoffError;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Major,
    Minor,
    Patch,
    Hotfix,
    Enhancement,
    Refactor,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Major => "MAJOR",
            ChangeKind::Minor => "MINOR",
            ChangeKind::Patch => "PATCH",
            ChangeKind::Hotfix => "HOTFIX",
            ChangeKind::Enhancement => "ENHANCEMENT",
            ChangeKind::Refactor => "REFACTOR",
        }
    }

    pub fn from_kind_str(s: &str) -> Option<Self> {
        match s {
            "MAJOR" => Some(ChangeKind::Major),
            "MINOR" => Some(ChangeKind::Minor),
            "PATCH" => Some(ChangeKind::Patch),
            "HOTFIX" => Some(ChangeKind::Hotfix),
            "ENHANCEMENT" => Some(ChangeKind::Enhancement),
            "REFACTOR" => Some(ChangeKind::Refactor),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Version {
    pub version_id: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub change_kind: ChangeKind,
    pub created_at: String,
    pub created_by: String,
    pub notes: Option<String>,
    pub current: bool,
}

impl Version {
    pub fn display(&self) -> String {
        format!("v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

pub struct VersionInput<'a> {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub change_kind: ChangeKind,
    pub created_by: &'a str,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct VersionLedger {
    pub versions: Vec<Version>,
    pub current_major: u32,
    pub current_minor: u32,
    pub current_patch: u32,
    pub current_display: String,
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version as the new current one. Flips every existing entry's
    /// flag, appends with `current = true`, and moves the pointer fields —
    /// all within this single `&mut` call, so the one-current invariant is
    /// never observable mid-update.
    pub fn add_version(&mut self, input: VersionInput<'_>, now: DateTime<Utc>) -> &Version {
        for existing in &mut self.versions {
            existing.current = false;
        }
        self.versions.push(Version {
            version_id: Ulid::new().to_string(),
            major: input.major,
            minor: input.minor,
            patch: input.patch,
            change_kind: input.change_kind,
            created_at: now.to_rfc3339(),
            created_by: input.created_by.to_string(),
            notes: input.notes.map(|n| n.to_string()),
            current: true,
        });
        let added = self.versions.last().unwrap();
        self.current_major = added.major;
        self.current_minor = added.minor;
        self.current_patch = added.patch;
        self.current_display = added.display();
        self.versions.last().unwrap()
    }

    pub fn current(&self) -> Option<&Version> {
        self.versions.iter().find(|v| v.current)
    }

    /// Fatal consistency check: a non-empty ledger must hold exactly one
    /// current entry, and the pointer fields must match it.
    pub fn verify_consistency(&self) -> Result<(), SignoffError> {
        if self.versions.is_empty() {
            return Ok(());
        }
        let currents: Vec<&Version> = self.versions.iter().filter(|v| v.current).collect();
        if currents.len() != 1 {
            return Err(SignoffError::VersionConsistency(format!(
                "expected exactly one current version, found {}",
                currents.len()
            )));
        }
        let current = currents[0];
        if (current.major, current.minor, current.patch)
            != (self.current_major, self.current_minor, self.current_patch)
        {
            return Err(SignoffError::VersionConsistency(format!(
                "current pointer {} does not match flagged version {}",
                self.current_display,
                current.display()
            )));
        }
        Ok(())
    }
}

/// Caller-side bump helper: the next number for a change classification,
/// starting from the ledger's current pointer (or 0.0.0 for an empty ledger).
/// The ledger itself never applies this.
pub fn next_version(ledger: &VersionLedger, kind: ChangeKind) -> (u32, u32, u32) {
    let (major, minor, patch) = match ledger.current() {
        Some(v) => (v.major, v.minor, v.patch),
        None => (0, 0, 0),
    };
    match kind {
        ChangeKind::Major => (major + 1, 0, 0),
        ChangeKind::Minor | ChangeKind::Enhancement => (major, minor + 1, 0),
        ChangeKind::Patch | ChangeKind::Hotfix | ChangeKind::Refactor => {
            (major, minor, patch + 1)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeRequestState {
    Pending,
    Approved,
    Rejected,
}

impl ChangeRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeRequestState::Pending => "PENDING",
            ChangeRequestState::Approved => "APPROVED",
            ChangeRequestState::Rejected => "REJECTED",
        }
    }

    pub fn from_state_str(s: &str) -> Self {
        match s {
            "APPROVED" => ChangeRequestState::Approved,
            "REJECTED" => ChangeRequestState::Rejected,
            _ => ChangeRequestState::Pending,
        }
    }
}

/// A proposed change to a report, admitted only outside freeze windows.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChangeRequest {
    pub request_id: String,
    pub report_id: String,
    pub change_kind: ChangeKind,
    pub requested_by: String,
    pub state: ChangeRequestState,
    pub requested_at: String,
    pub scheduled_for: Option<String>,
    pub implemented_at: Option<String>,
    pub decided_by: Option<String>,
    pub decided_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn input(major: u32, minor: u32, patch: u32, kind: ChangeKind) -> VersionInput<'static> {
        VersionInput {
            major,
            minor,
            patch,
            change_kind: kind,
            created_by: "release-bot",
            notes: None,
        }
    }

    #[test]
    fn add_version_keeps_exactly_one_current() {
        let mut ledger = VersionLedger::new();
        ledger.add_version(input(1, 0, 0, ChangeKind::Major), now());
        ledger.add_version(input(1, 1, 0, ChangeKind::Minor), now());
        ledger.add_version(input(1, 1, 1, ChangeKind::Patch), now());

        let currents: Vec<_> = ledger.versions.iter().filter(|v| v.current).collect();
        assert_eq!(currents.len(), 1);
        assert_eq!(currents[0].display(), "v1.1.1");
        assert_eq!(ledger.current_display, "v1.1.1");
        assert!(ledger.verify_consistency().is_ok());
    }

    #[test]
    fn current_is_most_recently_added() {
        let mut ledger = VersionLedger::new();
        for i in 0..10 {
            ledger.add_version(input(1, i, 0, ChangeKind::Minor), now());
        }
        assert_eq!(ledger.current().unwrap().minor, 9);
    }

    #[test]
    fn empty_ledger_is_consistent() {
        assert!(VersionLedger::new().verify_consistency().is_ok());
    }

    #[test]
    fn duplicate_current_flags_are_fatal() {
        let mut ledger = VersionLedger::new();
        ledger.add_version(input(1, 0, 0, ChangeKind::Major), now());
        ledger.add_version(input(1, 0, 1, ChangeKind::Patch), now());
        ledger.versions[0].current = true;
        assert!(matches!(
            ledger.verify_consistency(),
            Err(SignoffError::VersionConsistency(_))
        ));
    }

    #[test]
    fn zero_current_flags_are_fatal() {
        let mut ledger = VersionLedger::new();
        ledger.add_version(input(1, 0, 0, ChangeKind::Major), now());
        ledger.versions[0].current = false;
        assert!(matches!(
            ledger.verify_consistency(),
            Err(SignoffError::VersionConsistency(_))
        ));
    }

    #[test]
    fn stale_pointer_is_fatal() {
        let mut ledger = VersionLedger::new();
        ledger.add_version(input(1, 0, 0, ChangeKind::Major), now());
        ledger.current_minor = 9;
        assert!(matches!(
            ledger.verify_consistency(),
            Err(SignoffError::VersionConsistency(_))
        ));
    }

    #[test]
    fn next_version_maps_change_kinds() {
        let mut ledger = VersionLedger::new();
        assert_eq!(next_version(&ledger, ChangeKind::Major), (1, 0, 0));
        ledger.add_version(input(2, 3, 4, ChangeKind::Major), now());

        assert_eq!(next_version(&ledger, ChangeKind::Major), (3, 0, 0));
        assert_eq!(next_version(&ledger, ChangeKind::Minor), (2, 4, 0));
        assert_eq!(next_version(&ledger, ChangeKind::Enhancement), (2, 4, 0));
        assert_eq!(next_version(&ledger, ChangeKind::Patch), (2, 3, 5));
        assert_eq!(next_version(&ledger, ChangeKind::Hotfix), (2, 3, 5));
        assert_eq!(next_version(&ledger, ChangeKind::Refactor), (2, 3, 5));
    }
}
