//! Quality gate: aggregates pass/fail checks into a single go/no-go signal.
//!
//! The gate is an input to the release go/no-go composition made by the
//! calling layer; the lifecycle state machine does not consult it.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CheckSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckSeverity::Low => "LOW",
            CheckSeverity::Medium => "MEDIUM",
            CheckSeverity::High => "HIGH",
            CheckSeverity::Critical => "CRITICAL",
        }
    }

    pub fn from_severity_str(s: &str) -> Self {
        match s {
            "LOW" => CheckSeverity::Low,
            "HIGH" => CheckSeverity::High,
            "CRITICAL" => CheckSeverity::Critical,
            _ => CheckSeverity::Medium,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityCheck {
    pub check_id: String,
    pub name: String,
    pub passed: bool,
    pub severity: CheckSeverity,
    pub score: f64,
    pub recorded_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct QualityGate {
    pub checks: Vec<QualityCheck>,
    pub failed_count: u32,
}

impl QualityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check(
        &mut self,
        name: &str,
        passed: bool,
        severity: CheckSeverity,
        score: f64,
        now: DateTime<Utc>,
    ) -> &QualityCheck {
        if !passed {
            self.failed_count += 1;
        }
        self.checks.push(QualityCheck {
            check_id: Ulid::new().to_string(),
            name: name.to_string(),
            passed,
            severity,
            score,
            recorded_at: now.to_rfc3339(),
        });
        self.checks.last().unwrap()
    }

    /// True iff no check has failed. An empty gate passes.
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn empty_gate_passes() {
        assert!(QualityGate::new().all_passed());
    }

    #[test]
    fn any_failure_blocks_the_gate() {
        let mut gate = QualityGate::new();
        gate.record_check("row-count", true, CheckSeverity::Medium, 1.0, now());
        gate.record_check("freshness", false, CheckSeverity::High, 0.2, now());
        gate.record_check("schema-drift", true, CheckSeverity::Low, 0.9, now());

        assert!(!gate.all_passed());
        assert_eq!(gate.failed_count, 1);
        assert_eq!(gate.checks.len(), 3);
    }

    #[test]
    fn failed_count_tracks_every_failure() {
        let mut gate = QualityGate::new();
        for _ in 0..4 {
            gate.record_check("freshness", false, CheckSeverity::Critical, 0.0, now());
        }
        assert_eq!(gate.failed_count, 4);
    }
}
