use crate::constants::system;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Lifecycle event publisher for task, activity, bucket and node events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// Publishing with no subscribers is fine; the event is simply dropped. Slow
    /// subscribers lag rather than block publishers.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) -> usize {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: Utc::now(),
        };

        match self.sender.send(event) {
            Ok(receiver_count) => receiver_count,
            Err(broadcast::error::SendError(event)) => {
                trace!(event_name = %event.name, "Event published with no subscribers");
                0
            }
        }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(system::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
