use crate::constants::events;
use crate::context::Flow;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle event kinds published by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EngineEventKind {
    FlowCompleted,
    FlowSuspended,
    FlowAborted,
    FlowFaulted,
    DeliverySubmitted,
    DeliveryCompleted,
    DeliveryFailed,
}

impl EngineEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FlowCompleted => events::FLOW_COMPLETED,
            Self::FlowSuspended => events::FLOW_SUSPENDED,
            Self::FlowAborted => events::FLOW_ABORTED,
            Self::FlowFaulted => events::FLOW_FAULTED,
            Self::DeliverySubmitted => events::DELIVERY_SUBMITTED,
            Self::DeliveryCompleted => events::DELIVERY_COMPLETED,
            Self::DeliveryFailed => events::DELIVERY_FAILED,
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    pub kind: EngineEventKind,
    pub message_id: Uuid,
    pub flow: Flow,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Broadcast publisher for engine lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, kind: EngineEventKind, message_id: Uuid, flow: Flow, context: Value) {
        let event = EngineEvent {
            kind,
            message_id,
            flow,
            context,
            published_at: chrono::Utc::now(),
        };

        if self.sender.send(event).is_err() {
            tracing::trace!(event = kind.name(), "No event subscribers");
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
