//! Lifecycle events emitted by the engine and the SLA sweeps
//!
//! Events are wrapped in an envelope carrying an id, timestamp,
//! inferred severity and a topic scoped to the owning execution or
//! workflow so subscribers can filter selectively.

use crate::{ExecutionId, SlaRecordId, TaskId, UserId, WorkflowId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Envelope wrapping all engine events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Severity inferred from the event variant
    pub severity: EventSeverity,
    /// Subscription topic, scoped per execution or workflow
    pub topic: String,
    /// The actual event
    pub event: EngineEvent,
}

/// Engine lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Execution ran out of matching edges and completed
    ExecutionCompleted {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
    },

    /// Execution failed terminally
    ExecutionFailed {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        error: String,
    },

    /// Execution cancelled by an external action
    ExecutionCancelled {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        reason: String,
    },

    /// An approval step produced a task
    TaskCreated {
        task_id: TaskId,
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        assigned_to: UserId,
    },

    /// A task left its pending state
    TaskResolved {
        task_id: TaskId,
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        approved: bool,
    },

    /// An SLA record is approaching its due time
    SlaWarning {
        record_id: SlaRecordId,
        task_id: TaskId,
        workflow_id: WorkflowId,
        minutes_remaining: i64,
    },

    /// An SLA record passed its due time while its task was pending
    SlaBreach {
        record_id: SlaRecordId,
        task_id: TaskId,
        workflow_id: WorkflowId,
        breach_minutes: i64,
    },
}

impl EngineEvent {
    /// Topic used for selective subscription
    pub fn topic(&self) -> String {
        match self {
            EngineEvent::ExecutionCompleted { execution_id, .. }
            | EngineEvent::ExecutionFailed { execution_id, .. }
            | EngineEvent::ExecutionCancelled { execution_id, .. }
            | EngineEvent::TaskCreated { execution_id, .. }
            | EngineEvent::TaskResolved { execution_id, .. } => execution_id.to_string(),
            EngineEvent::SlaWarning { workflow_id, .. }
            | EngineEvent::SlaBreach { workflow_id, .. } => workflow_id.to_string(),
        }
    }

    /// Infer severity from the event variant
    pub fn severity(&self) -> EventSeverity {
        match self {
            EngineEvent::ExecutionFailed { .. } | EngineEvent::SlaBreach { .. } => {
                EventSeverity::Error
            }
            EngineEvent::ExecutionCancelled { .. } | EngineEvent::SlaWarning { .. } => {
                EventSeverity::Warning
            }
            _ => EventSeverity::Info,
        }
    }
}

impl EngineEventEnvelope {
    /// Wrap an event, stamping id, timestamp, severity and topic
    pub fn new(event: EngineEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            severity: event.severity(),
            topic: event.topic(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_infers_severity() {
        let envelope = EngineEventEnvelope::new(EngineEvent::ExecutionFailed {
            execution_id: ExecutionId::generate(),
            workflow_id: WorkflowId::generate(),
            error: "boom".into(),
        });
        assert_eq!(envelope.severity, EventSeverity::Error);
        assert!(envelope.topic.starts_with("execution:"));
    }

    #[test]
    fn test_sla_events_scope_to_workflow() {
        let workflow_id = WorkflowId::generate();
        let event = EngineEvent::SlaWarning {
            record_id: SlaRecordId::generate(),
            task_id: TaskId::generate(),
            workflow_id: workflow_id.clone(),
            minutes_remaining: 42,
        };
        assert_eq!(event.topic(), workflow_id.to_string());
        assert_eq!(event.severity(), EventSeverity::Warning);
    }
}
