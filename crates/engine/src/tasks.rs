//! Task resolution: the only external input that un-suspends an execution
//!
//! Approval and rejection are authorized against the task's assignee,
//! resolve the task exactly once, finalize the step's SLA record, and
//! append to the execution's history. Approval re-enqueues an
//! advancement job anchored at the resolved step; rejection fails the
//! execution terminally.

use crate::engine::{AdvancementJob, JOB_ADVANCE};
use crate::error::{EngineError, EngineResult};
use crate::events::EventBus;
use crate::notify::NotificationSink;
use crate::storage::Storage;
use chrono::Utc;
use greenlight_queue::JobQueue;
use greenlight_types::{
    EngineEvent, EventSeverity, Execution, StepHistoryEntry, StepOutcome, Task, TaskId, UserId,
};
use std::sync::Arc;

struct ServiceInner {
    store: Arc<dyn Storage>,
    sink: Arc<dyn NotificationSink>,
    queue: JobQueue,
    events: EventBus,
}

/// Resolves tasks on behalf of users
#[derive(Clone)]
pub struct TaskService {
    inner: Arc<ServiceInner>,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn Storage>,
        sink: Arc<dyn NotificationSink>,
        queue: JobQueue,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                store,
                sink,
                queue,
                events,
            }),
        }
    }

    /// Approve a pending task and resume its execution
    pub async fn approve(
        &self,
        task_id: &TaskId,
        user: &UserId,
        comment: Option<String>,
    ) -> EngineResult<Task> {
        let mut task = self.load_authorized(task_id, user).await?;
        if !task.approve(user.clone(), comment) {
            return Err(EngineError::TaskNotPending(task_id.clone()));
        }
        self.inner.store.save_task(task.clone()).await?;
        self.finalize_sla(&task).await?;

        if let Some(mut execution) = self.inner.store.get_execution(&task.execution_id).await? {
            execution.record_step(
                StepHistoryEntry::completed_now(task.step_id.clone(), "approved")
                    .with_outcome(StepOutcome::Approved)
                    .with_actor(user.clone()),
            );
            self.inner.store.save_execution(execution.clone()).await?;
            self.notify_initiator(&execution, &task, true).await;
        }

        self.inner.events.publish(EngineEvent::TaskResolved {
            task_id: task.id.clone(),
            execution_id: task.execution_id.clone(),
            workflow_id: task.workflow_id.clone(),
            approved: true,
        });
        self.enqueue_continuation(&task).await;
        tracing::info!(task_id = %task.id, execution_id = %task.execution_id, "Task approved");
        Ok(task)
    }

    /// Reject a pending task, failing its execution
    pub async fn reject(
        &self,
        task_id: &TaskId,
        user: &UserId,
        comment: Option<String>,
    ) -> EngineResult<Task> {
        let mut task = self.load_authorized(task_id, user).await?;
        if !task.reject(user.clone(), comment) {
            return Err(EngineError::TaskNotPending(task_id.clone()));
        }
        self.inner.store.save_task(task.clone()).await?;
        self.finalize_sla(&task).await?;

        if let Some(mut execution) = self.inner.store.get_execution(&task.execution_id).await? {
            execution.record_step(
                StepHistoryEntry::completed_now(task.step_id.clone(), "rejected")
                    .with_outcome(StepOutcome::Rejected)
                    .with_actor(user.clone()),
            );
            let error = format!("Task rejected by {user}");
            execution.fail(error.clone());
            self.inner.store.save_execution(execution.clone()).await?;
            self.inner.events.publish(EngineEvent::ExecutionFailed {
                execution_id: execution.id.clone(),
                workflow_id: execution.workflow_id.clone(),
                error,
            });
            self.notify_initiator(&execution, &task, false).await;
        }

        self.inner.events.publish(EngineEvent::TaskResolved {
            task_id: task.id.clone(),
            execution_id: task.execution_id.clone(),
            workflow_id: task.workflow_id.clone(),
            approved: false,
        });
        tracing::info!(task_id = %task.id, execution_id = %task.execution_id, "Task rejected");
        Ok(task)
    }

    /// Append a comment without resolving the task
    pub async fn add_comment(
        &self,
        task_id: &TaskId,
        user: &UserId,
        comment: impl Into<String>,
    ) -> EngineResult<Task> {
        let mut task = self
            .inner
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
        task.add_comment(user.clone(), comment);
        self.inner.store.save_task(task.clone()).await?;
        Ok(task)
    }

    async fn load_authorized(&self, task_id: &TaskId, user: &UserId) -> EngineResult<Task> {
        let task = self
            .inner
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
        if &task.assigned_to != user {
            return Err(EngineError::NotAuthorized(task_id.clone()));
        }
        Ok(task)
    }

    /// Set `completed_time` on the step's SLA record so the sweeps stop
    /// watching it.
    async fn finalize_sla(&self, task: &Task) -> EngineResult<()> {
        if let Some(mut record) = self
            .inner
            .store
            .find_sla_record_for_step(&task.execution_id, &task.step_id)
            .await?
        {
            record.mark_completed(task.completed_at.unwrap_or_else(Utc::now));
            self.inner.store.save_sla_record(record).await?;
        }
        Ok(())
    }

    async fn notify_initiator(&self, execution: &Execution, task: &Task, approved: bool) {
        let (title, severity) = if approved {
            ("Approval granted", EventSeverity::Info)
        } else {
            ("Approval rejected", EventSeverity::Warning)
        };
        let message = format!(
            "Step '{}' of execution {} was {}",
            task.step_id,
            execution.id,
            if approved { "approved" } else { "rejected" },
        );
        if let Err(e) = self
            .inner
            .sink
            .notify(&execution.triggered_by, title, &message, severity)
            .await
        {
            tracing::warn!(task_id = %task.id, error = %e, "Resolution notification failed");
        }
    }

    async fn enqueue_continuation(&self, task: &Task) {
        let payload = AdvancementJob {
            execution_id: task.execution_id.clone(),
            from_step_id: Some(task.step_id.clone()),
        };
        match serde_json::to_value(&payload) {
            Ok(value) => {
                self.inner.queue.enqueue(JOB_ADVANCE, value).await;
            }
            Err(e) => {
                tracing::error!(
                    execution_id = %task.execution_id,
                    error = %e,
                    "Failed to encode continuation job"
                );
            }
        }
    }
}
