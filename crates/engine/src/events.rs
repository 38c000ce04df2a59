//! Broadcast event bus for engine lifecycle events
//!
//! Fire-and-forget fan-out over a tokio broadcast channel. Publishing
//! with no subscribers is fine; slow subscribers lose the oldest
//! events, never block the engine.

use greenlight_types::{EngineEvent, EngineEventEnvelope};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Cheaply clonable publish/subscribe handle
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Wrap and broadcast an event. Lossy when nobody subscribes.
    pub fn publish(&self, event: EngineEvent) {
        let envelope = EngineEventEnvelope::new(event);
        tracing::debug!(topic = %envelope.topic, "Publishing engine event");
        let _ = self.sender.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
