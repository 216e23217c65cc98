//! Governance aggregate: one record per report identity owning the lifecycle
//! record, approval workflow, version ledger, and quality gate.
//!
//! `transition` is the only way a report moves between stages. It checks the
//! transition table, the approval gate (for moves into APPROVED), and the
//! freeze gate, then applies the full state change or nothing. Audit dispatch
//! is the caller's job after a successful transition.

use crate::core::approval::{Workflow, WorkflowStatus};
use crate::core::error::SignoffError;
use crate::core::freeze::FreezeWindow;
use crate::core::lifecycle::{DeprecationInfo, LifecycleRecord, Stage, StageTransition};
use crate::core::quality::QualityGate;
use crate::core::version::VersionLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GovernanceRecord {
    pub report_id: String,
    pub lifecycle: LifecycleRecord,
    pub workflow: Workflow,
    pub versions: VersionLedger,
    pub quality: QualityGate,
    pub created_at: String,
    pub updated_at: String,
}

pub struct TransitionInput<'a> {
    pub to: Stage,
    pub actor: &'a str,
    pub reason: &'a str,
    /// Captured in the same operation when `to == DEPRECATED`; ignored
    /// otherwise.
    pub deprecation: Option<DeprecationInfo>,
}

impl GovernanceRecord {
    pub fn new(report_id: &str, now: DateTime<Utc>) -> Self {
        let ts = now.to_rfc3339();
        Self {
            report_id: report_id.to_string(),
            lifecycle: LifecycleRecord::new(),
            workflow: Workflow::new(),
            versions: VersionLedger::new(),
            quality: QualityGate::new(),
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    /// Advance the report to `to`, or fail leaving the record untouched.
    ///
    /// Gate order: transition table, approval workflow (only for APPROVED),
    /// freeze window. All transitions count as changes under a freeze.
    pub fn transition(
        &mut self,
        input: TransitionInput<'_>,
        freeze: &FreezeWindow,
        now: DateTime<Utc>,
    ) -> Result<StageTransition, SignoffError> {
        if !self.lifecycle.can_transition(input.to) {
            return Err(SignoffError::InvalidTransition(format!(
                "{} -> {} is not allowed",
                self.lifecycle
                    .current
                    .map(|s| s.as_str())
                    .unwrap_or("(none)"),
                input.to.as_str()
            )));
        }
        if input.to == Stage::Approved && self.workflow.status() != WorkflowStatus::Approved {
            return Err(SignoffError::ApprovalRequired(format!(
                "workflow status is {}, every required step must be approved",
                self.workflow.status().as_str()
            )));
        }
        if freeze.is_frozen(now) {
            return Err(SignoffError::ChangeFrozen(format!(
                "stage transitions are blocked until {}",
                freeze.until_display()
            )));
        }

        let ts = now.to_rfc3339();
        self.lifecycle
            .record(input.to, input.actor, input.reason, &ts);
        if input.to == Stage::Deprecated {
            self.lifecycle.deprecation = Some(input.deprecation.unwrap_or(DeprecationInfo {
                reason: input.reason.to_string(),
                replacement: None,
                retirement_date: None,
            }));
        }
        self.updated_at = ts;
        Ok(self.lifecycle.history.last().unwrap().clone())
    }
}

/// Persistence port. Load/save the whole aggregate; transaction boundaries
/// are the adapter's concern.
pub trait Repository {
    fn load(&self, report_id: &str) -> Result<GovernanceRecord, SignoffError>;
    fn save(&self, record: &GovernanceRecord) -> Result<(), SignoffError>;
}

/// Receives stage transitions after they commit. Fire-and-forget: sink
/// failures never unwind a completed transition.
pub trait AuditSink {
    fn record_transition(&self, report_id: &str, transition: &StageTransition);
}
