//! SLA records: deadlines tracked against approval-step instances
//!
//! A record exists only for approval steps that declare `sla_hours`.
//! The sweeps mutate it; task resolution finalizes it by setting
//! `completed_time`. At most one warning and one breach notification
//! entry are ever recorded.

use crate::{ExecutionId, SlaRecordId, StepId, TaskId, WorkflowId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of SLA notifications, each sent at most once per record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaNotificationKind {
    Warning,
    Breach,
}

/// One entry in a record's notification log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaNotification {
    pub kind: SlaNotificationKind,
    pub sent_at: DateTime<Utc>,
}

/// Deadline tracking for one approval-step instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaRecord {
    /// Unique record identifier
    pub id: SlaRecordId,
    pub workflow_id: WorkflowId,
    pub execution_id: ExecutionId,
    pub step_id: StepId,
    /// The task whose resolution satisfies this SLA
    pub task_id: Option<TaskId>,
    /// Allowed hours from start to resolution
    pub sla_hours: u32,
    pub start_time: DateTime<Utc>,
    pub due_time: DateTime<Utc>,
    /// Set by task resolution; a set value excludes the record from sweeps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
    pub breached: bool,
    /// Minutes past due at breach detection; set once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breach_duration_minutes: Option<i64>,
    /// Ordered notification log, at most one entry per kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications_sent: Vec<SlaNotification>,
}

impl SlaRecord {
    /// Create a record starting now with a due time `sla_hours` ahead
    pub fn new(
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        step_id: StepId,
        sla_hours: u32,
    ) -> Self {
        let start = Utc::now();
        Self {
            id: SlaRecordId::generate(),
            workflow_id,
            execution_id,
            step_id,
            task_id: None,
            sla_hours,
            start_time: start,
            due_time: start + Duration::hours(i64::from(sla_hours)),
            completed_time: None,
            breached: false,
            breach_duration_minutes: None,
            notifications_sent: Vec::new(),
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Whether a notification of the given kind was already sent
    pub fn has_notification(&self, kind: SlaNotificationKind) -> bool {
        self.notifications_sent.iter().any(|n| n.kind == kind)
    }

    /// Append a notification entry unless one of this kind exists.
    /// Returns false when the entry was suppressed.
    pub fn record_notification(&mut self, kind: SlaNotificationKind) -> bool {
        if self.has_notification(kind) {
            return false;
        }
        self.notifications_sent.push(SlaNotification {
            kind,
            sent_at: Utc::now(),
        });
        true
    }

    /// Flag the record breached as of `now`, fixing the breach duration.
    /// Returns false when already breached.
    pub fn mark_breached(&mut self, now: DateTime<Utc>) -> bool {
        if self.breached {
            return false;
        }
        self.breached = true;
        let overdue_secs = (now - self.due_time).num_seconds();
        self.breach_duration_minutes = Some((overdue_secs as f64 / 60.0).round() as i64);
        true
    }

    /// Finalize the record at task resolution
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.completed_time = Some(at);
    }
}
