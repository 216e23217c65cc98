//! Approval workflow: an ordered list of steps that derives one aggregate
//! status.
//!
//! Rejection is sticky: once any step is rejected the workflow stays REJECTED
//! regardless of later approvals of other steps. The aggregate is always
//! derived from the step list, never stored independently.

use crate::core::error::SignoffError;
use crate::core::freeze::FreezeWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Approved => "APPROVED",
            StepStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_status_str(s: &str) -> Self {
        match s {
            "APPROVED" => StepStatus::Approved,
            "REJECTED" => StepStatus::Rejected,
            _ => StepStatus::Pending,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "PENDING",
            WorkflowStatus::InProgress => "IN_PROGRESS",
            WorkflowStatus::Approved => "APPROVED",
            WorkflowStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApprovalStep {
    pub step_id: String,
    pub position: u32,
    pub approver: String,
    pub required: bool,
    pub status: StepStatus,
    pub created_at: String,
    pub decided_at: Option<String>,
    pub decided_by: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Workflow {
    pub steps: Vec<ApprovalStep>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step at the next ordered position.
    pub fn add_step(&mut self, approver: &str, required: bool, now: DateTime<Utc>) -> &ApprovalStep {
        let position = self.steps.len() as u32 + 1;
        self.steps.push(ApprovalStep {
            step_id: Ulid::new().to_string(),
            position,
            approver: approver.to_string(),
            required,
            status: StepStatus::Pending,
            created_at: now.to_rfc3339(),
            decided_at: None,
            decided_by: None,
            comment: None,
        });
        self.steps.last().unwrap()
    }

    /// Derive the aggregate status from the step list.
    pub fn status(&self) -> WorkflowStatus {
        if self.steps.iter().any(|s| s.status == StepStatus::Rejected) {
            return WorkflowStatus::Rejected;
        }
        if self.steps.is_empty()
            || self.steps.iter().all(|s| s.status == StepStatus::Pending)
        {
            return WorkflowStatus::Pending;
        }
        if self
            .steps
            .iter()
            .filter(|s| s.required)
            .all(|s| s.status == StepStatus::Approved)
        {
            return WorkflowStatus::Approved;
        }
        WorkflowStatus::InProgress
    }

    pub fn approve_step(
        &mut self,
        step_id: &str,
        actor: &str,
        comment: Option<&str>,
        freeze: &FreezeWindow,
        now: DateTime<Utc>,
    ) -> Result<WorkflowStatus, SignoffError> {
        self.decide(step_id, StepStatus::Approved, actor, comment, freeze, now)
    }

    pub fn reject_step(
        &mut self,
        step_id: &str,
        actor: &str,
        comment: Option<&str>,
        freeze: &FreezeWindow,
        now: DateTime<Utc>,
    ) -> Result<WorkflowStatus, SignoffError> {
        self.decide(step_id, StepStatus::Rejected, actor, comment, freeze, now)
    }

    fn decide(
        &mut self,
        step_id: &str,
        decision: StepStatus,
        actor: &str,
        comment: Option<&str>,
        freeze: &FreezeWindow,
        now: DateTime<Utc>,
    ) -> Result<WorkflowStatus, SignoffError> {
        if freeze.is_frozen(now) {
            return Err(SignoffError::ChangeFrozen(format!(
                "approval step decisions are blocked until {}",
                freeze.until_display()
            )));
        }
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.step_id == step_id)
            .ok_or_else(|| SignoffError::NotFound(format!("approval step {}", step_id)))?;
        step.status = decision;
        step.decided_at = Some(now.to_rfc3339());
        step.decided_by = Some(actor.to_string());
        step.comment = comment.map(|c| c.to_string());
        Ok(self.status())
    }
}
