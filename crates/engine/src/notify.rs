//! Notification delivery seam
//!
//! The engine describes what to tell whom; transport is a host concern.
//! Delivery failures must not stall an execution, so the engine logs
//! sink errors and moves on.

use async_trait::async_trait;
use greenlight_types::{EventSeverity, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where user-facing notifications go
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user: &UserId,
        title: &str,
        message: &str,
        severity: EventSeverity,
    ) -> Result<(), String>;
}

/// One delivered notification, as captured by [`RecordingSink`]
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub user: UserId,
    pub title: String,
    pub message: String,
    pub severity: EventSeverity,
}

/// Sink that records deliveries in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        user: &UserId,
        title: &str,
        message: &str,
        severity: EventSeverity,
    ) -> Result<(), String> {
        let mut sent = self.sent.lock().await;
        sent.push(SentNotification {
            user: user.clone(),
            title: title.to_string(),
            message: message.to_string(),
            severity,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sink_captures_in_order() {
        let sink = RecordingSink::new();
        sink.notify(&UserId::new("alice"), "first", "m1", EventSeverity::Info)
            .await
            .unwrap();
        sink.notify(&UserId::new("bob"), "second", "m2", EventSeverity::Warning)
            .await
            .unwrap();

        let sent = sink.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].title, "first");
        assert_eq!(sent[1].user, UserId::new("bob"));
    }
}
