//! In-memory storage implementation for development and testing

use super::traits::*;
use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenlight_types::{
    Execution, ExecutionId, SlaNotificationKind, SlaRecord, SlaRecordId, StepId, Task, TaskId,
    VersionId, WorkflowVersion,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Default)]
pub struct InMemoryStore {
    versions: Arc<RwLock<HashMap<VersionId, WorkflowVersion>>>,
    executions: Arc<RwLock<HashMap<ExecutionId, Execution>>>,
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
    sla_records: Arc<RwLock<HashMap<SlaRecordId, SlaRecord>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a version snapshot; versions are immutable so there is no
    /// general save path
    pub async fn insert_version(&self, version: WorkflowVersion) {
        let mut versions = self.versions.write().await;
        versions.insert(version.id.clone(), version);
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn get_version(&self, id: &VersionId) -> StorageResult<Option<WorkflowVersion>> {
        let versions = self.versions.read().await;
        Ok(versions.get(id).cloned())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Option<Execution>> {
        let executions = self.executions.read().await;
        Ok(executions.get(id).cloned())
    }

    async fn save_execution(&self, execution: Execution) -> StorageResult<()> {
        let mut executions = self.executions.write().await;
        executions.insert(execution.id.clone(), execution);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn get_task(&self, id: &TaskId) -> StorageResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(id).cloned())
    }

    async fn save_task(&self, task: Task) -> StorageResult<()> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), task);
        Ok(())
    }
}

#[async_trait]
impl SlaStore for InMemoryStore {
    async fn get_sla_record(&self, id: &SlaRecordId) -> StorageResult<Option<SlaRecord>> {
        let records = self.sla_records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn save_sla_record(&self, record: SlaRecord) -> StorageResult<()> {
        let mut records = self.sla_records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_sla_record_for_step(
        &self,
        execution_id: &ExecutionId,
        step_id: &StepId,
    ) -> StorageResult<Option<SlaRecord>> {
        let records = self.sla_records.read().await;
        Ok(records
            .values()
            .find(|r| &r.execution_id == execution_id && &r.step_id == step_id)
            .cloned())
    }

    async fn list_breach_candidates(&self, now: DateTime<Utc>) -> StorageResult<Vec<SlaRecord>> {
        let records = self.sla_records.read().await;
        Ok(records
            .values()
            .filter(|r| !r.breached && r.due_time < now && r.completed_time.is_none())
            .cloned()
            .collect())
    }

    async fn list_warning_candidates(
        &self,
        now: DateTime<Utc>,
        lookahead: chrono::Duration,
    ) -> StorageResult<Vec<SlaRecord>> {
        let horizon = now + lookahead;
        let records = self.sla_records.read().await;
        Ok(records
            .values()
            .filter(|r| {
                !r.breached
                    && r.due_time > now
                    && r.due_time < horizon
                    && r.completed_time.is_none()
                    && !r.has_notification(SlaNotificationKind::Warning)
            })
            .cloned()
            .collect())
    }
}

impl Storage for InMemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use greenlight_types::{UserId, WorkflowId};

    fn record_due_in(minutes: i64) -> SlaRecord {
        let mut record = SlaRecord::new(
            WorkflowId::generate(),
            ExecutionId::generate(),
            StepId::new("review"),
            1,
        );
        record.due_time = Utc::now() + Duration::minutes(minutes);
        record
    }

    #[tokio::test]
    async fn test_execution_round_trip() {
        let store = InMemoryStore::new();
        let execution = Execution::new(
            WorkflowId::generate(),
            VersionId::generate(),
            UserId::new("alice"),
            None,
        );
        let id = execution.id.clone();

        store.save_execution(execution).await.unwrap();
        assert!(store.get_execution(&id).await.unwrap().is_some());
        assert!(store
            .get_execution(&ExecutionId::generate())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_breach_candidates_are_past_due_only() {
        let store = InMemoryStore::new();
        store.save_sla_record(record_due_in(-30)).await.unwrap();
        store.save_sla_record(record_due_in(30)).await.unwrap();

        let mut completed = record_due_in(-30);
        completed.mark_completed(Utc::now());
        store.save_sla_record(completed).await.unwrap();

        let candidates = store.list_breach_candidates(Utc::now()).await.unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_warning_candidates_exclude_already_warned() {
        let store = InMemoryStore::new();
        store.save_sla_record(record_due_in(30)).await.unwrap();

        let mut warned = record_due_in(30);
        warned.record_notification(SlaNotificationKind::Warning);
        store.save_sla_record(warned).await.unwrap();

        // Due beyond the lookahead window.
        store.save_sla_record(record_due_in(120)).await.unwrap();

        let candidates = store
            .list_warning_candidates(Utc::now(), Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_find_sla_record_for_step() {
        let store = InMemoryStore::new();
        let record = record_due_in(10);
        let execution_id = record.execution_id.clone();
        store.save_sla_record(record).await.unwrap();

        assert!(store
            .find_sla_record_for_step(&execution_id, &StepId::new("review"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_sla_record_for_step(&execution_id, &StepId::new("other"))
            .await
            .unwrap()
            .is_none());
    }
}
