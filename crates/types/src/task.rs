//! Tasks: pending human decisions generated by approval steps
//!
//! A task is bound 1:1 to one approval-step instance of one execution.
//! Its status leaves `Pending` exactly once; `approve`/`reject` return
//! false instead of resolving twice.

use crate::{ExecutionId, StepId, TaskId, UserId, VersionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A pending human decision bound to one approval-step instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    pub workflow_id: WorkflowId,
    pub execution_id: ExecutionId,
    pub version_id: VersionId,
    /// The approval step this task resolves
    pub step_id: StepId,
    /// Who must decide
    pub assigned_to: UserId,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Deadline mirrored from the step's SLA, when one is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Comment log
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<TaskComment>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<UserId>,
}

impl Task {
    pub fn new(
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        version_id: VersionId,
        step_id: StepId,
        assigned_to: UserId,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            workflow_id,
            execution_id,
            version_id,
            step_id,
            assigned_to,
            status: TaskStatus::Pending,
            priority: TaskPriority::default(),
            due_date: None,
            comments: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            completed_by: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Resolve as approved. Returns false if the task already left `Pending`.
    pub fn approve(&mut self, by: UserId, comment: Option<String>) -> bool {
        self.resolve(TaskStatus::Approved, by, comment)
    }

    /// Resolve as rejected. Returns false if the task already left `Pending`.
    pub fn reject(&mut self, by: UserId, comment: Option<String>) -> bool {
        self.resolve(TaskStatus::Rejected, by, comment)
    }

    fn resolve(&mut self, status: TaskStatus, by: UserId, comment: Option<String>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        if let Some(comment) = comment {
            self.comments.push(TaskComment::new(by.clone(), comment));
        }
        self.completed_by = Some(by);
        true
    }

    /// Append a comment without resolving
    pub fn add_comment(&mut self, by: UserId, comment: impl Into<String>) {
        self.comments.push(TaskComment::new(by, comment));
    }
}

/// One entry in a task's comment log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub user_id: UserId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl TaskComment {
    pub fn new(user_id: UserId, comment: impl Into<String>) -> Self {
        Self {
            user_id,
            comment: comment.into(),
            created_at: Utc::now(),
        }
    }
}
