//! Error types for greenlight-engine

use greenlight_types::{ExecutionId, StepId, TaskId, VersionId};
use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g., already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Backend connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Execution does not exist; fatal, never retried
    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// Workflow version does not exist
    #[error("Workflow version not found: {0}")]
    VersionNotFound(VersionId),

    /// Task does not exist
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// An edge targets a step id the version does not declare
    #[error("Step not found in version: {0}")]
    StepNotFound(StepId),

    /// No assignee could be resolved for an approval step; fatal to
    /// the execution
    #[error("No assignee found for approval step '{0}'")]
    AssigneeUnresolved(StepId),

    /// The acting user is not the task's assignee
    #[error("User is not assigned to task {0}")]
    NotAuthorized(TaskId),

    /// The task already left its pending state
    #[error("Task {0} is not pending")]
    TaskNotPending(TaskId),

    /// The execution is already in a terminal state
    #[error("Execution {0} is not running")]
    ExecutionNotRunning(ExecutionId),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
