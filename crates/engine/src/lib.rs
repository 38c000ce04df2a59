//! Greenlight execution engine
//!
//! Advances approval-workflow executions through their directed step
//! graphs. The engine consumes advancement jobs from an in-process
//! queue, suspends on approval steps until a task resolution resumes
//! it, and audits per-step deadlines with two periodic SLA sweeps.
//!
//! Persistence, directory lookup, notification transport and condition
//! evaluation are injected through traits; [`InMemoryStore`],
//! [`StaticDirectory`], [`RecordingSink`] and [`KeyEqualsEvaluator`]
//! cover single-process hosts and tests.

mod condition;
mod config;
mod directory;
mod engine;
mod error;
mod events;
mod notify;
mod storage;
mod sweep;
mod tasks;

pub use condition::{ConditionEvaluator, ExecutionSnapshot, KeyEqualsEvaluator};
pub use config::{EngineConfig, QueueConfig, SweepConfig};
pub use directory::{Directory, StaticDirectory};
pub use engine::{AdvancementJob, ExecutionEngine, ExecutionInit, JOB_ADVANCE};
pub use error::{EngineError, EngineResult, StorageError, StorageResult};
pub use events::EventBus;
pub use notify::{NotificationSink, RecordingSink, SentNotification};
pub use storage::{
    ExecutionStore, InMemoryStore, SlaStore, Storage, TaskStore, WorkflowStore,
};
pub use sweep::SlaSweeper;
pub use tasks::TaskService;
