//! Broadcast channel for appended events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The session
//! driver publishes every event right after it lands in the
//! [`super::EventLog`], and stream-style consumers subscribe to receive
//! them as they arrive.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::Event;

/// Broadcast bus for appended [`Event`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 1 024). When the ring buffer is full, the oldest events are
/// dropped for lagging receivers; the [`super::EventLog`] still holds them.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<Event>>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all receivers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: Arc<Event>) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_event(event_type: &str) -> Arc<Event> {
        let frame = format!(r#"{{"type":"{event_type}"}}"#);
        let Ok(event) = Event::decode(&frame) else {
            panic!("test frame must decode");
        };
        Arc::new(event)
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(16);
        let count = bus.publish(make_event("plane"));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(make_event("crashed"));

        let Ok(event) = rx.recv().await else {
            panic!("expected to receive event");
        };
        assert_eq!(event.event_type(), "crashed");
    }

    #[tokio::test]
    async fn multiple_subscribers_share_the_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let count = bus.publish(make_event("landing"));
        assert_eq!(count, 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert!(Arc::ptr_eq(&e1, &e2));
    }

    #[tokio::test]
    async fn lagging_receiver_reports_skipped_events() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for t in ["flights", "plane", "crashed"] {
            bus.publish(make_event(t));
        }
        let Err(broadcast::error::RecvError::Lagged(skipped)) = rx.recv().await else {
            panic!("expected lag");
        };
        assert_eq!(skipped, 1);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
