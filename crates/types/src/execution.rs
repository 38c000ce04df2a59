//! Workflow executions: one run of a workflow version
//!
//! An execution carries the engine's only mutable state: its status,
//! the single currently active step, an append-only step history and a
//! free-form data map consulted by edge conditions. Terminal statuses
//! are final; the transition methods are no-ops once one is reached.

use crate::{ExecutionId, StepId, UserId, VersionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// One run of a workflow version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution identifier
    pub id: ExecutionId,
    /// The workflow being run
    pub workflow_id: WorkflowId,
    /// The immutable version snapshot being run
    pub version_id: VersionId,
    /// Who triggered the run
    pub triggered_by: UserId,
    /// Current lifecycle status
    pub status: ExecutionStatus,
    /// The single active step; `None` only before the first advance or
    /// after the graph is exhausted
    pub current_step_id: Option<StepId>,
    /// Free-form data visible to edge conditions
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub execution_data: serde_json::Map<String, serde_json::Value>,
    /// Append-only log of executed steps
    pub step_history: Vec<StepHistoryEntry>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error text for failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Execution {
    /// Create a running execution anchored at `first_step`
    pub fn new(
        workflow_id: WorkflowId,
        version_id: VersionId,
        triggered_by: UserId,
        first_step: Option<StepId>,
    ) -> Self {
        Self {
            id: ExecutionId::generate(),
            workflow_id,
            version_id,
            triggered_by,
            status: ExecutionStatus::Running,
            current_step_id: first_step,
            execution_data: serde_json::Map::new(),
            step_history: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.execution_data = data;
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the run completed. No-op if already terminal.
    pub fn complete(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run failed with an error message. No-op if already terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run cancelled. No-op if already terminal.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Cancelled;
        self.error = Some(reason.into());
        self.completed_at = Some(Utc::now());
    }

    /// Append a step history entry
    pub fn record_step(&mut self, entry: StepHistoryEntry) {
        self.step_history.push(entry);
    }
}

/// Outcome recorded for one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Completed,
    Approved,
    Rejected,
    Failed,
}

/// One entry in an execution's step history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepHistoryEntry {
    /// The step that ran
    pub step_id: StepId,
    /// How it ended
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Actor for human-resolved steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserId>,
    /// Free-form result text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text for failed steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepHistoryEntry {
    /// Entry for a step that completed just now
    pub fn completed_now(step_id: StepId, result: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id,
            outcome: StepOutcome::Completed,
            started_at: now,
            completed_at: now,
            actor: None,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_outcome(mut self, outcome: StepOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_execution() -> Execution {
        Execution::new(
            WorkflowId::generate(),
            VersionId::generate(),
            UserId::new("alice"),
            Some(StepId::new("start")),
        )
    }

    #[test]
    fn test_new_execution_is_running() {
        let execution = running_execution();
        assert!(execution.is_running());
        assert_eq!(execution.current_step_id, Some(StepId::new("start")));
        assert!(execution.completed_at.is_none());
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut execution = running_execution();
        execution.complete();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.completed_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut execution = running_execution();
        execution.fail("boom");
        let completed_at = execution.completed_at;

        // Neither a later complete nor a later cancel moves it again.
        execution.complete();
        execution.cancel("too late");
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.completed_at, completed_at);
        assert_eq!(execution.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_cancel_records_reason() {
        let mut execution = running_execution();
        execution.cancel("superseded");
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert_eq!(execution.error.as_deref(), Some("superseded"));
    }

    #[test]
    fn test_history_is_append_only() {
        let mut execution = running_execution();
        execution.record_step(StepHistoryEntry::completed_now(
            StepId::new("start"),
            "auto-executed",
        ));
        execution.record_step(
            StepHistoryEntry::completed_now(StepId::new("review"), "approved")
                .with_outcome(StepOutcome::Approved)
                .with_actor(UserId::new("bob")),
        );
        assert_eq!(execution.step_history.len(), 2);
        assert_eq!(execution.step_history[1].outcome, StepOutcome::Approved);
    }
}
