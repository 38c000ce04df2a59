//! End-to-end SLA breach scenario: the clock passes the due time while
//! the approval task is still pending

use chrono::{Duration, Utc};
use greenlight_engine::{
    EventBus, ExecutionEngine, ExecutionInit, ExecutionStore, InMemoryStore, KeyEqualsEvaluator,
    RecordingSink, SlaStore, SlaSweeper, StaticDirectory, SweepConfig, TaskStore,
};
use greenlight_queue::{JobQueue, QueueConfig};
use greenlight_types::{
    ApprovalConfig, Edge, EngineEvent, EventSeverity, ExecutionStatus, NotificationConfig, Step,
    StepId, StepKind, UserId, WorkflowId, WorkflowVersion,
};
use std::sync::Arc;

struct Stack {
    engine: ExecutionEngine,
    sweeper: SlaSweeper,
    store: Arc<InMemoryStore>,
    sink: Arc<RecordingSink>,
    events: EventBus,
}

async fn stack() -> Stack {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let queue = JobQueue::new(QueueConfig::default());
    let events = EventBus::new();
    let engine = ExecutionEngine::new(
        store.clone(),
        Arc::new(StaticDirectory::new()),
        sink.clone(),
        Arc::new(KeyEqualsEvaluator),
        queue.clone(),
        events.clone(),
    );
    engine.register().await;
    let sweeper = SlaSweeper::new(
        store.clone(),
        sink.clone(),
        events.clone(),
        SweepConfig::default(),
    );
    Stack {
        engine,
        sweeper,
        store,
        sink,
        events,
    }
}

/// Suspend an execution on an approval with a 1 hour SLA, then shift
/// the record's due time into the past as if the clock had advanced.
async fn suspended_overdue(s: &Stack, overdue_minutes: i64) -> greenlight_types::ExecutionId {
    let version = WorkflowVersion::new(WorkflowId::generate(), 1)
        .with_step(Step::new(
            "review",
            StepKind::Approval(ApprovalConfig {
                assignee: Some(UserId::new("bob")),
                sla_hours: Some(1),
                ..Default::default()
            }),
        ))
        .with_step(Step::new(
            "wrap-up",
            StepKind::Notification(NotificationConfig::default()),
        ))
        .with_edge(Edge::new("review", "wrap-up"));
    let version_id = version.id.clone();
    s.store.insert_version(version).await;

    let execution_id = s
        .engine
        .trigger(ExecutionInit::new(version_id, UserId::new("carol")))
        .await
        .unwrap();
    s.engine.queue().wait_until_idle().await;

    let mut record = s
        .store
        .find_sla_record_for_step(&execution_id, &StepId::new("review"))
        .await
        .unwrap()
        .unwrap();
    record.due_time = Utc::now() - Duration::minutes(overdue_minutes);
    s.store.save_sla_record(record).await.unwrap();
    execution_id
}

#[tokio::test]
async fn breach_is_detected_without_failing_the_execution() {
    let s = stack().await;
    let mut events = s.events.subscribe();
    let execution_id = suspended_overdue(&s, 90).await;

    assert_eq!(s.sweeper.breach_sweep().await.unwrap(), 1);

    let record = s
        .store
        .find_sla_record_for_step(&execution_id, &StepId::new("review"))
        .await
        .unwrap()
        .unwrap();
    assert!(record.breached);
    assert!(record.breach_duration_minutes.unwrap() >= 90);

    // Exactly one breach notification, at error severity, to the assignee.
    let sent = s.sink.sent().await;
    let breaches: Vec<_> = sent
        .iter()
        .filter(|n| n.severity == EventSeverity::Error)
        .collect();
    assert_eq!(breaches.len(), 1);
    assert_eq!(breaches[0].user, UserId::new("bob"));

    // Breach does not fail the execution; it is still waiting on the task.
    let execution = s.store.get_execution(&execution_id).await.unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Running);
    assert_eq!(execution.current_step_id, Some(StepId::new("review")));

    let saw_breach = std::iter::from_fn(|| events.try_recv().ok())
        .any(|e| matches!(e.event, EngineEvent::SlaBreach { .. }));
    assert!(saw_breach);
}

#[tokio::test]
async fn repeated_sweeps_are_idempotent() {
    let s = stack().await;
    let execution_id = suspended_overdue(&s, 30).await;

    assert_eq!(s.sweeper.breach_sweep().await.unwrap(), 1);
    assert_eq!(s.sweeper.breach_sweep().await.unwrap(), 0);
    assert_eq!(s.sweeper.warning_sweep().await.unwrap(), 0);

    let record = s
        .store
        .find_sla_record_for_step(&execution_id, &StepId::new("review"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.notifications_sent.len(), 1);
    let first_duration = record.breach_duration_minutes;

    assert_eq!(s.sweeper.breach_sweep().await.unwrap(), 0);
    let record = s
        .store
        .find_sla_record_for_step(&execution_id, &StepId::new("review"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.breach_duration_minutes, first_duration);
}

#[tokio::test]
async fn late_resolution_still_wins_before_the_sweep_sees_it() {
    let s = stack().await;
    let execution_id = suspended_overdue(&s, 15).await;

    // The assignee resolves just before the sweep tick.
    let record = s
        .store
        .find_sla_record_for_step(&execution_id, &StepId::new("review"))
        .await
        .unwrap()
        .unwrap();
    let mut task = s
        .store
        .get_task(record.task_id.as_ref().unwrap())
        .await
        .unwrap()
        .unwrap();
    task.approve(UserId::new("bob"), None);
    s.store.save_task(task).await.unwrap();

    assert_eq!(s.sweeper.breach_sweep().await.unwrap(), 0);
    let record = s
        .store
        .find_sla_record_for_step(&execution_id, &StepId::new("review"))
        .await
        .unwrap()
        .unwrap();
    assert!(!record.breached);
    assert!(record.notifications_sent.is_empty());
}
