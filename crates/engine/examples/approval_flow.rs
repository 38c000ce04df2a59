//! Runs a purchase-approval workflow end to end against the in-memory
//! backends: trigger, suspend on the approval, approve the task, and
//! watch the execution complete.
//!
//! ```sh
//! cargo run -p greenlight-engine --example approval_flow
//! ```

use greenlight_engine::{
    EngineConfig, EventBus, ExecutionEngine, ExecutionInit, ExecutionStore, InMemoryStore,
    KeyEqualsEvaluator, RecordingSink, SlaStore, SlaSweeper, StaticDirectory, TaskService,
};
use greenlight_queue::JobQueue;
use greenlight_types::{
    ApprovalConfig, Edge, NotificationConfig, Role, Step, StepId, StepKind, UserId, WorkflowId,
    WorkflowVersion,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = EngineConfig::load(None)?;

    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(StaticDirectory::new());
    directory.assign(Role::Manager, UserId::new("morgan")).await;

    let sink = Arc::new(RecordingSink::new());
    let queue = JobQueue::new((&config.queue).into());
    let events = EventBus::new();

    let engine = ExecutionEngine::new(
        store.clone(),
        directory,
        sink.clone(),
        Arc::new(KeyEqualsEvaluator),
        queue.clone(),
        events.clone(),
    );
    engine.register().await;
    let tasks = TaskService::new(store.clone(), sink.clone(), queue, events.clone());

    let sweeper = SlaSweeper::new(store.clone(), sink.clone(), events.clone(), config.sweep);
    sweeper.start().await;

    let mut feed = events.subscribe();

    let version = WorkflowVersion::new(WorkflowId::generate(), 1)
        .with_step(
            Step::new(
                "notify-requester",
                StepKind::Notification(NotificationConfig {
                    user_id: Some(UserId::new("sam")),
                    title: Some("Purchase request submitted".into()),
                    message: Some("Your request is on its way to a manager.".into()),
                }),
            )
            .with_label("Acknowledge request"),
        )
        .with_step(
            Step::new(
                "manager-approval",
                StepKind::Approval(ApprovalConfig {
                    assignee_role: Some(Role::Manager),
                    sla_hours: Some(24),
                    ..Default::default()
                }),
            )
            .with_label("Manager approval"),
        )
        .with_step(
            Step::new(
                "notify-done",
                StepKind::Notification(NotificationConfig {
                    user_id: Some(UserId::new("sam")),
                    title: Some("Purchase approved".into()),
                    message: None,
                }),
            )
            .with_label("Confirm approval"),
        )
        .with_edge(Edge::new("notify-requester", "manager-approval"))
        .with_edge(Edge::new("manager-approval", "notify-done"));
    let version_id = version.id.clone();
    store.insert_version(version).await;

    let execution_id = engine
        .trigger(ExecutionInit::new(version_id, UserId::new("sam")))
        .await?;
    engine.queue().wait_until_idle().await;

    let record = store
        .find_sla_record_for_step(&execution_id, &StepId::new("manager-approval"))
        .await?
        .expect("approval step declares an SLA");
    let task_id = record.task_id.expect("record links its task");
    tracing::info!(task_id = %task_id, due = %record.due_time, "Waiting on manager approval");

    tasks
        .approve(&task_id, &UserId::new("morgan"), Some("Within budget.".into()))
        .await?;
    engine.queue().wait_until_idle().await;

    let execution = store
        .get_execution(&execution_id)
        .await?
        .expect("execution exists");
    tracing::info!(
        execution_id = %execution.id,
        status = ?execution.status,
        steps = execution.step_history.len(),
        "Execution finished"
    );

    while let Ok(envelope) = feed.try_recv() {
        tracing::info!(topic = %envelope.topic, event = ?envelope.event, "Event");
    }

    sweeper.stop().await;
    Ok(())
}
