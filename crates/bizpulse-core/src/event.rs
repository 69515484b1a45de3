//! Event bus for bizpulse using tokio::broadcast
//!
//! Publishes job lifecycle and cache events for external transports.

use tokio::sync::broadcast;

use crate::models::OrgId;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    JobStarted { job_id: String, org_id: OrgId },
    JobProgress { job_id: String, progress: u8 },
    JobCompleted {
        job_id: String,
        org_id: OrgId,
        insight_count: usize,
    },
    JobFailed {
        job_id: String,
        org_id: OrgId,
        error: String,
    },
    /// `org_id` is None for a global invalidation
    CacheInvalidated {
        org_id: Option<OrgId>,
        removed: usize,
    },
    /// Periodic sweep removed expired entries
    CacheSwept { removed: usize },
}

/// Event bus for broadcasting engine events
///
/// Uses tokio::broadcast for multi-consumer support.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: EngineEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}
