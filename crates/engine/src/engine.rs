//! Execution engine: advances executions through their workflow graphs
//!
//! The engine is driven by advancement jobs. Each `advance` call moves
//! one execution by at most one step: it selects the next step from the
//! current anchor's outgoing edges (first match in declaration order
//! wins), persists the new position, runs the step's kind-specific
//! handler, and either suspends (approval) or enqueues its own
//! continuation. Retrying a failed advancement is the queue's job; the
//! engine itself never retries workflow logic.

use crate::condition::{ConditionEvaluator, ExecutionSnapshot};
use crate::directory::Directory;
use crate::error::{EngineError, EngineResult};
use crate::events::EventBus;
use crate::notify::NotificationSink;
use crate::storage::Storage;
use greenlight_queue::{Job, JobError, JobQueue};
use greenlight_types::{
    ApprovalConfig, AutoConfig, EngineEvent, EventSeverity, Execution, ExecutionId,
    NotificationConfig, SlaRecord, Step, StepHistoryEntry, StepId, StepKind, Task, UserId,
    VersionId, WorkflowVersion,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Job type consumed by the engine
pub const JOB_ADVANCE: &str = "execution.advance";

/// Payload of an advancement job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancementJob {
    /// The execution to advance
    pub execution_id: ExecutionId,
    /// Anchor step; absent only for the first advance after trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_step_id: Option<StepId>,
}

/// Parameters for starting a new execution
#[derive(Debug, Clone)]
pub struct ExecutionInit {
    pub version_id: VersionId,
    pub triggered_by: UserId,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionInit {
    pub fn new(version_id: VersionId, triggered_by: UserId) -> Self {
        Self {
            version_id,
            triggered_by,
            data: serde_json::Map::new(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }
}

struct EngineInner {
    store: Arc<dyn Storage>,
    directory: Arc<dyn Directory>,
    sink: Arc<dyn NotificationSink>,
    evaluator: Arc<dyn ConditionEvaluator>,
    queue: JobQueue,
    events: EventBus,
}

/// The execution engine.
///
/// Cheaply clonable handle; all collaborators are injected. There is no
/// per-execution lock: a new advancement job is only produced by the
/// previous handler or by a task resolution, and correctness relies on
/// that convention.
#[derive(Clone)]
pub struct ExecutionEngine {
    inner: Arc<EngineInner>,
}

impl ExecutionEngine {
    pub fn new(
        store: Arc<dyn Storage>,
        directory: Arc<dyn Directory>,
        sink: Arc<dyn NotificationSink>,
        evaluator: Arc<dyn ConditionEvaluator>,
        queue: JobQueue,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                directory,
                sink,
                evaluator,
                queue,
                events,
            }),
        }
    }

    /// The queue this engine consumes from
    pub fn queue(&self) -> &JobQueue {
        &self.inner.queue
    }

    /// The event bus this engine publishes to
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Wire the advancement handler into the queue. Must be called once
    /// before jobs of type [`JOB_ADVANCE`] are enqueued.
    pub async fn register(&self) {
        let engine = self.clone();
        self.inner
            .queue
            .register_handler(JOB_ADVANCE, move |job: Job| {
                let engine = engine.clone();
                async move {
                    let payload: AdvancementJob = job.payload_as()?;
                    match engine
                        .advance(&payload.execution_id, payload.from_step_id.as_ref())
                        .await
                    {
                        Ok(()) => Ok(()),
                        // A missing execution never becomes findable; retrying is pointless.
                        Err(EngineError::ExecutionNotFound(id)) => {
                            tracing::warn!(
                                execution_id = %id,
                                "Advancement job for unknown execution, dropping"
                            );
                            Ok(())
                        }
                        Err(e) => Err(JobError::failed(e.to_string())),
                    }
                }
            })
            .await;
    }

    /// Create an execution anchored at the version's first step and
    /// enqueue its first advancement job.
    pub async fn trigger(&self, init: ExecutionInit) -> EngineResult<ExecutionId> {
        let version = self.load_version(&init.version_id).await?;
        let first_step = version.first_step().map(|s| s.id.clone());
        let execution = Execution::new(
            version.workflow_id.clone(),
            version.id.clone(),
            init.triggered_by,
            first_step,
        )
        .with_data(init.data);
        let execution_id = execution.id.clone();

        self.inner.store.save_execution(execution).await?;
        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %version.workflow_id,
            "Execution triggered"
        );
        self.enqueue_advance(&execution_id, None).await;
        Ok(execution_id)
    }

    /// Advance an execution by one step.
    ///
    /// Storage errors and unknown executions propagate to the caller;
    /// every other failure is fatal to the execution and flips it to
    /// `failed` here.
    pub async fn advance(
        &self,
        execution_id: &ExecutionId,
        from_step_id: Option<&StepId>,
    ) -> EngineResult<()> {
        match self.advance_inner(execution_id, from_step_id).await {
            Ok(()) => Ok(()),
            Err(e @ (EngineError::ExecutionNotFound(_) | EngineError::Storage(_))) => Err(e),
            Err(e) => {
                tracing::error!(
                    execution_id = %execution_id,
                    error = %e,
                    "Advance failed, failing execution"
                );
                self.fail_execution(execution_id, e.to_string()).await
            }
        }
    }

    /// Cancel a running execution
    pub async fn cancel(
        &self,
        execution_id: &ExecutionId,
        reason: impl Into<String>,
    ) -> EngineResult<()> {
        let mut execution = self.load_execution(execution_id).await?;
        if !execution.is_running() {
            return Err(EngineError::ExecutionNotRunning(execution_id.clone()));
        }
        let reason = reason.into();
        execution.cancel(reason.clone());
        self.inner.store.save_execution(execution.clone()).await?;
        self.inner.events.publish(EngineEvent::ExecutionCancelled {
            execution_id: execution.id.clone(),
            workflow_id: execution.workflow_id,
            reason,
        });
        tracing::info!(execution_id = %execution_id, "Execution cancelled");
        Ok(())
    }

    async fn advance_inner(
        &self,
        execution_id: &ExecutionId,
        from_step_id: Option<&StepId>,
    ) -> EngineResult<()> {
        let mut execution = self.load_execution(execution_id).await?;
        if !execution.is_running() {
            tracing::info!(
                execution_id = %execution.id,
                status = ?execution.status,
                "Execution not running, ignoring advancement"
            );
            return Ok(());
        }
        let version = self.load_version(&execution.version_id).await?;

        let next = match from_step_id {
            None => version.first_step(),
            Some(from) => self.select_next_step(&version, from, &execution)?,
        };
        let Some(step) = next.cloned() else {
            return self.complete_execution(execution).await;
        };

        execution.current_step_id = Some(step.id.clone());
        self.inner.store.save_execution(execution.clone()).await?;
        tracing::info!(
            execution_id = %execution.id,
            step_id = %step.id,
            kind = step.kind.name(),
            "Entering step"
        );

        match &step.kind {
            StepKind::Approval(config) => self.run_approval(&execution, &step, config).await,
            StepKind::Notification(config) => {
                self.run_notification(execution, &step, config).await
            }
            StepKind::Auto(config) => self.run_auto(execution, &step, config).await,
            StepKind::Condition => self.run_condition(execution, &step).await,
            StepKind::Unknown => {
                tracing::warn!(
                    execution_id = %execution.id,
                    step_id = %step.id,
                    "Unknown step kind, execution will not advance"
                );
                Ok(())
            }
        }
    }

    /// First edge out of `from` whose condition is absent or true, in
    /// declaration order. `Ok(None)` means the graph is exhausted.
    fn select_next_step<'v>(
        &self,
        version: &'v WorkflowVersion,
        from: &StepId,
        execution: &Execution,
    ) -> EngineResult<Option<&'v Step>> {
        let snapshot = ExecutionSnapshot {
            execution_id: &execution.id,
            data: &execution.execution_data,
            history: &execution.step_history,
        };
        for edge in version.outgoing_edges(from) {
            let matched = match &edge.condition {
                None => true,
                Some(expr) => self.inner.evaluator.evaluate(expr, &snapshot),
            };
            if matched {
                let step = version
                    .step(&edge.target)
                    .ok_or_else(|| EngineError::StepNotFound(edge.target.clone()))?;
                return Ok(Some(step));
            }
        }
        Ok(None)
    }

    async fn complete_execution(&self, mut execution: Execution) -> EngineResult<()> {
        execution.complete();
        self.inner.store.save_execution(execution.clone()).await?;
        self.inner.events.publish(EngineEvent::ExecutionCompleted {
            execution_id: execution.id.clone(),
            workflow_id: execution.workflow_id,
        });
        tracing::info!(execution_id = %execution.id, "Execution completed");
        Ok(())
    }

    /// Create the task (and SLA record when the step declares a
    /// deadline), notify the assignee, and suspend: no continuation is
    /// enqueued until the task is resolved.
    async fn run_approval(
        &self,
        execution: &Execution,
        step: &Step,
        config: &ApprovalConfig,
    ) -> EngineResult<()> {
        let assignee = match &config.assignee {
            Some(user) => user.clone(),
            None => match config.assignee_role {
                Some(role) => self
                    .inner
                    .directory
                    .find_active_user_by_role(role)
                    .await
                    .ok_or_else(|| EngineError::AssigneeUnresolved(step.id.clone()))?,
                None => return Err(EngineError::AssigneeUnresolved(step.id.clone())),
            },
        };

        let record = config.sla_hours.map(|hours| {
            SlaRecord::new(
                execution.workflow_id.clone(),
                execution.id.clone(),
                step.id.clone(),
                hours,
            )
        });

        let mut task = Task::new(
            execution.workflow_id.clone(),
            execution.id.clone(),
            execution.version_id.clone(),
            step.id.clone(),
            assignee.clone(),
        )
        .with_priority(config.priority);
        if let Some(record) = &record {
            task = task.with_due_date(record.due_time);
        }
        self.inner.store.save_task(task.clone()).await?;

        if let Some(record) = record {
            self.inner
                .store
                .save_sla_record(record.with_task(task.id.clone()))
                .await?;
        }

        let title = format!("Approval required: {}", step.display_name());
        let message = format!("You have a pending approval for execution {}", execution.id);
        if let Err(e) = self
            .inner
            .sink
            .notify(&assignee, &title, &message, EventSeverity::Info)
            .await
        {
            tracing::warn!(task_id = %task.id, error = %e, "Assignment notification failed");
        }

        self.inner.events.publish(EngineEvent::TaskCreated {
            task_id: task.id.clone(),
            execution_id: execution.id.clone(),
            workflow_id: execution.workflow_id.clone(),
            assigned_to: assignee,
        });
        tracing::info!(
            execution_id = %execution.id,
            task_id = %task.id,
            step_id = %step.id,
            "Execution suspended on approval"
        );
        Ok(())
    }

    async fn run_notification(
        &self,
        mut execution: Execution,
        step: &Step,
        config: &NotificationConfig,
    ) -> EngineResult<()> {
        let result = match &config.user_id {
            Some(user) => {
                let title = config
                    .title
                    .clone()
                    .unwrap_or_else(|| step.display_name().to_string());
                let message = config.message.clone().unwrap_or_default();
                match self
                    .inner
                    .sink
                    .notify(user, &title, &message, EventSeverity::Info)
                    .await
                {
                    Ok(()) => "notification sent".to_string(),
                    Err(e) => {
                        // Delivery failures never stall the execution.
                        tracing::warn!(
                            execution_id = %execution.id,
                            step_id = %step.id,
                            error = %e,
                            "Notification delivery failed"
                        );
                        "notification delivery failed".to_string()
                    }
                }
            }
            None => "no recipient configured".to_string(),
        };

        execution.record_step(StepHistoryEntry::completed_now(step.id.clone(), result));
        self.inner.store.save_execution(execution.clone()).await?;
        self.enqueue_advance(&execution.id, Some(&step.id)).await;
        Ok(())
    }

    async fn run_auto(
        &self,
        mut execution: Execution,
        step: &Step,
        config: &AutoConfig,
    ) -> EngineResult<()> {
        // The action is opaque here; only its occurrence is logged.
        let result = if config.action.is_empty() {
            "auto step executed".to_string()
        } else {
            format!("action '{}' executed", config.action)
        };
        execution.record_step(StepHistoryEntry::completed_now(step.id.clone(), result));
        self.inner.store.save_execution(execution.clone()).await?;
        self.enqueue_advance(&execution.id, Some(&step.id)).await;
        Ok(())
    }

    /// The branch decision happens on the next advance, when this
    /// step's outgoing edges are evaluated.
    async fn run_condition(&self, mut execution: Execution, step: &Step) -> EngineResult<()> {
        execution.record_step(StepHistoryEntry::completed_now(
            step.id.clone(),
            "condition evaluated",
        ));
        self.inner.store.save_execution(execution.clone()).await?;
        self.enqueue_advance(&execution.id, Some(&step.id)).await;
        Ok(())
    }

    async fn fail_execution(&self, execution_id: &ExecutionId, error: String) -> EngineResult<()> {
        let mut execution = self.load_execution(execution_id).await?;
        if execution.is_terminal() {
            return Ok(());
        }
        execution.fail(error.clone());
        self.inner.store.save_execution(execution.clone()).await?;
        self.inner.events.publish(EngineEvent::ExecutionFailed {
            execution_id: execution.id.clone(),
            workflow_id: execution.workflow_id,
            error,
        });
        Ok(())
    }

    async fn enqueue_advance(&self, execution_id: &ExecutionId, from_step_id: Option<&StepId>) {
        let payload = AdvancementJob {
            execution_id: execution_id.clone(),
            from_step_id: from_step_id.cloned(),
        };
        match serde_json::to_value(&payload) {
            Ok(value) => {
                self.inner.queue.enqueue(JOB_ADVANCE, value).await;
            }
            Err(e) => {
                tracing::error!(
                    execution_id = %execution_id,
                    error = %e,
                    "Failed to encode advancement job"
                );
            }
        }
    }

    async fn load_execution(&self, id: &ExecutionId) -> EngineResult<Execution> {
        self.inner
            .store
            .get_execution(id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(id.clone()))
    }

    async fn load_version(&self, id: &VersionId) -> EngineResult<WorkflowVersion> {
        self.inner
            .store
            .get_version(id)
            .await?
            .ok_or_else(|| EngineError::VersionNotFound(id.clone()))
    }
}
