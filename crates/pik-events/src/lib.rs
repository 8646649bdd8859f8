//! Single-process publish/subscribe fan-out for ledger appends (spec §4.2).
//!
//! One [`EventBus`] per server process. `publish` never blocks on a slow
//! subscriber: each subscriber gets its own bounded channel, and a
//! subscriber that falls behind has its oldest events dropped rather than
//! stalling the publisher or any other subscriber (spec §4.2, §5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// The projection published after a ledger append commits (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerProjection {
    pub event_id: Uuid,
    pub root_id: Uuid,
    pub event_type: String,
    pub source_id: Option<String>,
    pub payload: serde_json::Value,
    pub changes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Bounded fan-out, sized for the ~200-subscriber ceiling in spec §4.2.
const CHANNEL_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<LedgerProjection>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Non-blocking publish. Returns the number of live subscribers that
    /// received the event; zero subscribers is not an error.
    pub fn publish(&self, event: LedgerProjection) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Registers a new subscriber. The returned [`Subscription`] starts
    /// receiving events published from this point forward only.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A single subscriber's view of the bus. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<LedgerProjection>,
}

impl Subscription {
    /// Waits for the next event. If this subscriber lagged far enough
    /// behind that the channel overwrote unread events, the lag is logged
    /// and the next still-buffered event is returned instead of failing —
    /// dropping stale events for a slow client beats blocking anyone else.
    pub async fn recv(&mut self) -> Option<LedgerProjection> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE subscriber lagged, dropping stale events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(event_type: &str) -> LedgerProjection {
        LedgerProjection {
            event_id: Uuid::new_v4(),
            root_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            source_id: None,
            payload: serde_json::json!({}),
            changes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_event_exactly_once() {
        let bus = EventBus::new();
        let mut subs: Vec<Subscription> = (0..5).map(|_| bus.subscribe()).collect();

        bus.publish(sample_event("identity.enrolled"));

        for sub in &mut subs {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.event_type, "identity.enrolled");
        }
    }

    #[tokio::test]
    async fn unsubscribing_stops_further_delivery() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        // receiver_count updates synchronously on drop
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = EventBus::new();
        let delivered = bus.publish(sample_event("identity.enrolled"));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_recovers_instead_of_erroring() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        for i in 0..(CHANNEL_CAPACITY + 10) {
            bus.publish(sample_event(&format!("event.{i}")));
        }

        // The lagged subscriber should still get a valid event back, not an error.
        let event = sub.recv().await;
        assert!(event.is_some());
    }
}
