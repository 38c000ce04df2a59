//! SLA sweeps: periodic deadline auditing
//!
//! Two independent tickers scan SLA records against wall-clock time.
//! The breach sweep flags overdue records; the warning sweep flags
//! records approaching their due time within a lookahead window. Both
//! skip records whose task was resolved concurrently (resolution wins)
//! and are idempotent through the per-kind notification guard. A
//! failing tick is logged and never stops future ticks.

use crate::config::SweepConfig;
use crate::error::EngineResult;
use crate::events::EventBus;
use crate::notify::NotificationSink;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use greenlight_types::{EngineEvent, EventSeverity, SlaNotificationKind, SlaRecord, Task};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct SweeperInner {
    store: Arc<dyn Storage>,
    sink: Arc<dyn NotificationSink>,
    events: EventBus,
    config: SweepConfig,
    running: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Periodic SLA breach and warning auditor
#[derive(Clone)]
pub struct SlaSweeper {
    inner: Arc<SweeperInner>,
}

impl SlaSweeper {
    pub fn new(
        store: Arc<dyn Storage>,
        sink: Arc<dyn NotificationSink>,
        events: EventBus,
        config: SweepConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SweeperInner {
                store,
                sink,
                events,
                config,
                running: AtomicBool::new(false),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start the two sweep loops. Idempotent; a second call is ignored.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("SLA sweeper already running");
            return;
        }
        tracing::info!(
            breach_interval_secs = self.inner.config.breach_interval_secs,
            warning_interval_secs = self.inner.config.warning_interval_secs,
            "Starting SLA sweeps"
        );

        let breach = self.clone();
        let breach_handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(breach.inner.config.breach_interval_secs));
            loop {
                ticker.tick().await;
                if !breach.inner.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = breach.breach_sweep().await {
                    tracing::error!(error = %e, "Breach sweep tick failed");
                }
            }
        });

        let warning = self.clone();
        let warning_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(
                warning.inner.config.warning_interval_secs,
            ));
            loop {
                ticker.tick().await;
                if !warning.inner.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = warning.warning_sweep().await {
                    tracing::error!(error = %e, "Warning sweep tick failed");
                }
            }
        });

        let mut handles = self.inner.handles.lock().await;
        handles.push(breach_handle);
        handles.push(warning_handle);
    }

    /// Stop both sweep loops
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut handles = self.inner.handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        tracing::info!("SLA sweeps stopped");
    }

    /// One breach tick. Returns how many records were flagged.
    pub async fn breach_sweep(&self) -> EngineResult<usize> {
        let now = Utc::now();
        let candidates = self.inner.store.list_breach_candidates(now).await?;
        let mut flagged = 0;
        for record in candidates {
            let record_id = record.id.clone();
            match self.breach_one(record, now).await {
                Ok(true) => flagged += 1,
                Ok(false) => {}
                // One bad record never aborts the rest of the tick.
                Err(e) => {
                    tracing::error!(record_id = %record_id, error = %e, "Breach handling failed")
                }
            }
        }
        if flagged > 0 {
            tracing::info!(flagged, "Breach sweep flagged records");
        }
        Ok(flagged)
    }

    /// One warning tick. Returns how many records were warned.
    pub async fn warning_sweep(&self) -> EngineResult<usize> {
        let now = Utc::now();
        let candidates = self
            .inner
            .store
            .list_warning_candidates(now, self.inner.config.warning_lookahead())
            .await?;
        let mut warned = 0;
        for record in candidates {
            let record_id = record.id.clone();
            match self.warn_one(record, now).await {
                Ok(true) => warned += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(record_id = %record_id, error = %e, "Warning handling failed")
                }
            }
        }
        if warned > 0 {
            tracing::info!(warned, "Warning sweep warned records");
        }
        Ok(warned)
    }

    async fn breach_one(&self, mut record: SlaRecord, now: DateTime<Utc>) -> EngineResult<bool> {
        let Some(task) = self.pending_task(&record).await? else {
            return Ok(false);
        };
        if !record.mark_breached(now) {
            return Ok(false);
        }
        record.record_notification(SlaNotificationKind::Breach);
        self.inner.store.save_sla_record(record.clone()).await?;

        let minutes = record.breach_duration_minutes.unwrap_or(0);
        let title = "SLA breached".to_string();
        let message = format!(
            "Approval '{}' is {} minutes past its deadline",
            record.step_id, minutes
        );
        if let Err(e) = self
            .inner
            .sink
            .notify(&task.assigned_to, &title, &message, EventSeverity::Error)
            .await
        {
            tracing::warn!(record_id = %record.id, error = %e, "Breach notification failed");
        }

        self.inner.events.publish(EngineEvent::SlaBreach {
            record_id: record.id.clone(),
            task_id: task.id,
            workflow_id: record.workflow_id.clone(),
            breach_minutes: minutes,
        });
        tracing::warn!(
            record_id = %record.id,
            execution_id = %record.execution_id,
            breach_minutes = minutes,
            "SLA breached"
        );
        Ok(true)
    }

    async fn warn_one(&self, mut record: SlaRecord, now: DateTime<Utc>) -> EngineResult<bool> {
        let Some(task) = self.pending_task(&record).await? else {
            return Ok(false);
        };
        if !record.record_notification(SlaNotificationKind::Warning) {
            return Ok(false);
        }
        self.inner.store.save_sla_record(record.clone()).await?;

        let minutes_remaining = (record.due_time - now).num_minutes();
        let title = "SLA deadline approaching".to_string();
        let message = format!(
            "Approval '{}' is due in {} minutes",
            record.step_id, minutes_remaining
        );
        if let Err(e) = self
            .inner
            .sink
            .notify(&task.assigned_to, &title, &message, EventSeverity::Warning)
            .await
        {
            tracing::warn!(record_id = %record.id, error = %e, "Warning notification failed");
        }

        self.inner.events.publish(EngineEvent::SlaWarning {
            record_id: record.id.clone(),
            task_id: task.id,
            workflow_id: record.workflow_id.clone(),
            minutes_remaining,
        });
        Ok(true)
    }

    /// The record's linked task, only while it is still pending.
    /// A resolved task means resolution won the race; skip quietly.
    async fn pending_task(&self, record: &SlaRecord) -> EngineResult<Option<Task>> {
        let Some(task_id) = &record.task_id else {
            tracing::warn!(record_id = %record.id, "SLA record has no linked task, skipping");
            return Ok(None);
        };
        let Some(task) = self.inner.store.get_task(task_id).await? else {
            tracing::warn!(record_id = %record.id, task_id = %task_id, "Linked task missing");
            return Ok(None);
        };
        if !task.is_pending() {
            return Ok(None);
        }
        Ok(Some(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingSink;
    use crate::storage::{InMemoryStore, SlaStore, TaskStore};
    use chrono::Duration as ChronoDuration;
    use greenlight_types::{
        ExecutionId, SlaRecordId, StepId, TaskId, UserId, VersionId, WorkflowId,
    };

    struct Harness {
        sweeper: SlaSweeper,
        store: Arc<InMemoryStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let sweeper = SlaSweeper::new(
            store.clone(),
            sink.clone(),
            EventBus::new(),
            SweepConfig::default(),
        );
        Harness {
            sweeper,
            store,
            sink,
        }
    }

    /// Seed a record due `minutes` from now with a linked pending task
    async fn seed_record(h: &Harness, minutes: i64) -> SlaRecordId {
        let task = greenlight_types::Task::new(
            WorkflowId::generate(),
            ExecutionId::generate(),
            VersionId::generate(),
            StepId::new("review"),
            UserId::new("bob"),
        );
        let mut record = SlaRecord::new(
            task.workflow_id.clone(),
            task.execution_id.clone(),
            task.step_id.clone(),
            1,
        )
        .with_task(task.id.clone());
        record.due_time = Utc::now() + ChronoDuration::minutes(minutes);
        let record_id = record.id.clone();
        h.store.save_task(task).await.unwrap();
        h.store.save_sla_record(record).await.unwrap();
        record_id
    }

    #[tokio::test]
    async fn test_breach_sweep_flags_overdue_once() {
        let h = harness();
        let record_id = seed_record(&h, -45).await;

        assert_eq!(h.sweeper.breach_sweep().await.unwrap(), 1);
        let record = h.store.get_sla_record(&record_id).await.unwrap().unwrap();
        assert!(record.breached);
        assert_eq!(record.breach_duration_minutes, Some(45));
        assert!(record.has_notification(SlaNotificationKind::Breach));

        // Second tick with no time advance flags nothing new.
        assert_eq!(h.sweeper.breach_sweep().await.unwrap(), 0);
        let record = h.store.get_sla_record(&record_id).await.unwrap().unwrap();
        assert_eq!(record.notifications_sent.len(), 1);
        assert_eq!(h.sink.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_wins_over_the_breach_sweep() {
        let h = harness();
        let record_id = seed_record(&h, -10).await;

        let record = h.store.get_sla_record(&record_id).await.unwrap().unwrap();
        let mut task = h
            .store
            .get_task(record.task_id.as_ref().unwrap())
            .await
            .unwrap()
            .unwrap();
        task.approve(UserId::new("bob"), None);
        h.store.save_task(task).await.unwrap();

        assert_eq!(h.sweeper.breach_sweep().await.unwrap(), 0);
        let record = h.store.get_sla_record(&record_id).await.unwrap().unwrap();
        assert!(!record.breached);
        assert!(h.sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_warning_sweep_warns_inside_the_window_once() {
        let h = harness();
        let soon = seed_record(&h, 30).await;
        let far = seed_record(&h, 300).await;

        assert_eq!(h.sweeper.warning_sweep().await.unwrap(), 1);
        let record = h.store.get_sla_record(&soon).await.unwrap().unwrap();
        assert!(record.has_notification(SlaNotificationKind::Warning));
        assert!(!record.breached);

        let record = h.store.get_sla_record(&far).await.unwrap().unwrap();
        assert!(record.notifications_sent.is_empty());

        // Repeated ticks never re-warn.
        assert_eq!(h.sweeper.warning_sweep().await.unwrap(), 0);
        assert_eq!(h.sink.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_record_without_linked_task_is_skipped() {
        let h = harness();
        let mut record = SlaRecord::new(
            WorkflowId::generate(),
            ExecutionId::generate(),
            StepId::new("review"),
            1,
        );
        record.due_time = Utc::now() - ChronoDuration::minutes(5);
        h.store.save_sla_record(record).await.unwrap();

        assert_eq!(h.sweeper.breach_sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_breached_record_is_not_warned() {
        let h = harness();
        let record_id = seed_record(&h, -5).await;
        assert_eq!(h.sweeper.breach_sweep().await.unwrap(), 1);

        assert_eq!(h.sweeper.warning_sweep().await.unwrap(), 0);
        let record = h.store.get_sla_record(&record_id).await.unwrap().unwrap();
        assert!(!record.has_notification(SlaNotificationKind::Warning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_sweeper_ticks_on_its_own() {
        let h = harness();
        seed_record(&h, -45).await;

        h.sweeper.start().await;
        // First interval tick fires immediately.
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.sweeper.stop().await;

        let sent = h.sink.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].severity, EventSeverity::Error);
    }

    #[tokio::test]
    async fn test_missing_task_id_reference() {
        let h = harness();
        let record_id = seed_record(&h, -5).await;

        // Point the record at a task that no longer exists.
        let mut record = h.store.get_sla_record(&record_id).await.unwrap().unwrap();
        record.task_id = Some(TaskId::generate());
        h.store.save_sla_record(record).await.unwrap();

        assert_eq!(h.sweeper.breach_sweep().await.unwrap(), 0);
    }
}
