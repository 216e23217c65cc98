//! Report lifecycle stages and the transition table.
//!
//! A report has no implicit initial stage: the only legal first transition is
//! into DRAFT, and RETIRED is terminal. The history is an append-only ledger;
//! the current stage always equals the `to` of the last entry.

use crate::core::error::SignoffError;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Draft,
    Review,
    Approved,
    Published,
    Deprecated,
    Archived,
    Retired,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Draft => "DRAFT",
            Stage::Review => "REVIEW",
            Stage::Approved => "APPROVED",
            Stage::Published => "PUBLISHED",
            Stage::Deprecated => "DEPRECATED",
            Stage::Archived => "ARCHIVED",
            Stage::Retired => "RETIRED",
        }
    }

    pub fn from_stage_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Stage::Draft),
            "REVIEW" => Some(Stage::Review),
            "APPROVED" => Some(Stage::Approved),
            "PUBLISHED" => Some(Stage::Published),
            "DEPRECATED" => Some(Stage::Deprecated),
            "ARCHIVED" => Some(Stage::Archived),
            "RETIRED" => Some(Stage::Retired),
            _ => None,
        }
    }
}

/// Exhaustive transition table. Any pair not listed is illegal.
pub fn allowed_transition(from: Option<Stage>, to: Stage) -> bool {
    use Stage::*;
    matches!(
        (from, to),
        (None, Draft)
            | (Some(Draft), Review)
            | (Some(Review), Approved)
            | (Some(Review), Draft)
            | (Some(Approved), Published)
            | (Some(Approved), Review)
            | (Some(Published), Deprecated)
            | (Some(Published), Archived)
            | (Some(Deprecated), Archived)
            | (Some(Deprecated), Retired)
            | (Some(Archived), Retired)
            | (Some(Archived), Published)
    )
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageTransition {
    pub event_id: String,
    pub from: Option<Stage>,
    pub to: Stage,
    pub ts: String,
    pub actor: String,
    pub reason: String,
}

/// Metadata captured atomically with a transition into DEPRECATED.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeprecationInfo {
    pub reason: String,
    pub replacement: Option<String>,
    pub retirement_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LifecycleRecord {
    pub current: Option<Stage>,
    pub previous: Option<Stage>,
    pub changed_at: Option<String>,
    pub changed_by: Option<String>,
    pub history: Vec<StageTransition>,
    pub deprecation: Option<DeprecationInfo>,
}

impl LifecycleRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_transition(&self, to: Stage) -> bool {
        allowed_transition(self.current, to)
    }

    /// Append a transition and move the stage pointers. Gate checks (table,
    /// approval, freeze) live on the governance aggregate; this only records.
    pub(crate) fn record(&mut self, to: Stage, actor: &str, reason: &str, ts: &str) {
        self.history.push(StageTransition {
            event_id: crate::core::time::new_event_id(),
            from: self.current,
            to,
            ts: ts.to_string(),
            actor: actor.to_string(),
            reason: reason.to_string(),
        });
        self.previous = self.current;
        self.current = Some(to);
        self.changed_at = Some(ts.to_string());
        self.changed_by = Some(actor.to_string());
    }

    /// Check the record's structural invariant: the current stage equals the
    /// `to` of the last history entry (or is absent when the history is
    /// empty). Violations indicate a corrupted store.
    pub fn verify(&self) -> Result<(), SignoffError> {
        let expected = self.history.last().map(|t| t.to);
        if self.current != expected {
            return Err(SignoffError::ValidationError(format!(
                "lifecycle history does not match current stage (current {:?}, last entry {:?})",
                self.current, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_draft_enters_from_nothing() {
        assert!(allowed_transition(None, Stage::Draft));
        for stage in [
            Stage::Review,
            Stage::Approved,
            Stage::Published,
            Stage::Deprecated,
            Stage::Archived,
            Stage::Retired,
        ] {
            assert!(!allowed_transition(None, stage));
        }
    }

    #[test]
    fn retired_is_terminal() {
        for stage in [
            Stage::Draft,
            Stage::Review,
            Stage::Approved,
            Stage::Published,
            Stage::Deprecated,
            Stage::Archived,
            Stage::Retired,
        ] {
            assert!(!allowed_transition(Some(Stage::Retired), stage));
        }
    }

    #[test]
    fn review_can_bounce_back_to_draft() {
        assert!(allowed_transition(Some(Stage::Review), Stage::Draft));
        assert!(allowed_transition(Some(Stage::Approved), Stage::Review));
    }

    #[test]
    fn archived_can_republish() {
        assert!(allowed_transition(Some(Stage::Archived), Stage::Published));
        assert!(!allowed_transition(Some(Stage::Archived), Stage::Draft));
    }

    #[test]
    fn draft_cannot_jump_to_published() {
        assert!(!allowed_transition(Some(Stage::Draft), Stage::Published));
        assert!(!allowed_transition(Some(Stage::Draft), Stage::Approved));
    }

    #[test]
    fn record_appends_and_moves_pointers() {
        let mut record = LifecycleRecord::new();
        record.record(Stage::Draft, "alice", "created", "2025-01-01T00:00:00Z");
        record.record(Stage::Review, "alice", "ready", "2025-01-02T00:00:00Z");

        assert_eq!(record.current, Some(Stage::Review));
        assert_eq!(record.previous, Some(Stage::Draft));
        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history[0].from, None);
        assert_eq!(record.history[1].from, Some(Stage::Draft));
        assert!(record.verify().is_ok());
    }

    #[test]
    fn verify_detects_divergent_pointer() {
        let mut record = LifecycleRecord::new();
        record.record(Stage::Draft, "alice", "created", "2025-01-01T00:00:00Z");
        record.current = Some(Stage::Published);
        assert!(record.verify().is_err());
    }

    #[test]
    fn stage_round_trips_through_strings() {
        for stage in [
            Stage::Draft,
            Stage::Review,
            Stage::Approved,
            Stage::Published,
            Stage::Deprecated,
            Stage::Archived,
            Stage::Retired,
        ] {
            assert_eq!(Stage::from_stage_str(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::from_stage_str("LIMBO"), None);
    }
}
