//! Domain model for the Greenlight approval-workflow engine
//!
//! Pure data types shared by the queue, the execution engine and the
//! SLA sweeps: workflow versions (steps + edges), executions, tasks,
//! SLA records and lifecycle events. No I/O lives here.

mod edge;
mod event;
mod execution;
mod ids;
mod sla;
mod step;
mod task;
mod version;

pub use edge::Edge;
pub use event::{EngineEvent, EngineEventEnvelope, EventSeverity};
pub use execution::{Execution, ExecutionStatus, StepHistoryEntry, StepOutcome};
pub use ids::{ExecutionId, Role, SlaRecordId, StepId, TaskId, UserId, VersionId, WorkflowId};
pub use sla::{SlaNotification, SlaNotificationKind, SlaRecord};
pub use step::{ApprovalConfig, AutoConfig, NotificationConfig, Step, StepKind};
pub use task::{Task, TaskComment, TaskPriority, TaskStatus};
pub use version::WorkflowVersion;
