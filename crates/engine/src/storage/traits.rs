//! Storage trait definitions
//!
//! The engine and the sweeps consume persistence through these narrow
//! contracts; the backing technology is a host concern.

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenlight_types::{
    Execution, ExecutionId, SlaRecord, SlaRecordId, Task, TaskId, VersionId, WorkflowVersion,
};

/// Combined storage trait
#[async_trait]
pub trait Storage: WorkflowStore + ExecutionStore + TaskStore + SlaStore + Send + Sync {}

/// Read-only access to workflow version snapshots
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Get a version by ID
    async fn get_version(&self, id: &VersionId) -> StorageResult<Option<WorkflowVersion>>;
}

/// Storage for executions
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Get an execution by ID
    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Option<Execution>>;

    /// Create or update an execution
    async fn save_execution(&self, execution: Execution) -> StorageResult<()>;
}

/// Storage for tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Get a task by ID
    async fn get_task(&self, id: &TaskId) -> StorageResult<Option<Task>>;

    /// Create or update a task
    async fn save_task(&self, task: Task) -> StorageResult<()>;
}

/// Storage for SLA records
#[async_trait]
pub trait SlaStore: Send + Sync {
    /// Get a record by ID
    async fn get_sla_record(&self, id: &SlaRecordId) -> StorageResult<Option<SlaRecord>>;

    /// Create or update a record
    async fn save_sla_record(&self, record: SlaRecord) -> StorageResult<()>;

    /// Get the record tracking one execution/step pair, if any
    async fn find_sla_record_for_step(
        &self,
        execution_id: &ExecutionId,
        step_id: &greenlight_types::StepId,
    ) -> StorageResult<Option<SlaRecord>>;

    /// Records that are past due, unbreached and unresolved as of `now`
    async fn list_breach_candidates(&self, now: DateTime<Utc>) -> StorageResult<Vec<SlaRecord>>;

    /// Unbreached, unresolved records due within `lookahead` of `now`
    /// that have not yet been warned
    async fn list_warning_candidates(
        &self,
        now: DateTime<Utc>,
        lookahead: chrono::Duration,
    ) -> StorageResult<Vec<SlaRecord>>;
}
