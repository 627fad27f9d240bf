//! Callback subscribers with isolated delivery.
//!
//! Each subscriber gets its own unbounded queue and its own Tokio task.
//! The session driver only pushes `Arc<Event>` pointers onto the queues,
//! so a slow callback never holds up ingestion or other subscribers. Errors
//! returned by a callback, and panics inside it, are caught per invocation
//! and logged; the subscriber keeps receiving later events.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::domain::{Event, SubscriptionId};
use crate::error::SessionError;

#[derive(Debug)]
struct Slot {
    id: SubscriptionId,
    queue: mpsc::UnboundedSender<Arc<Event>>,
}

/// Registered subscribers, notified in registration order.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    slots: Mutex<Vec<Slot>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` and spawns its delivery task.
    ///
    /// The callback sees every event dispatched after this call returns,
    /// exactly once and in dispatch order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn register<F>(&self, callback: F) -> Result<SubscriptionId, SessionError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let id = SubscriptionId::new();
        let (queue, rx) = mpsc::unbounded_channel();
        runtime.spawn(deliver(id, rx, callback));

        self.slots.lock().push(Slot { id, queue });
        tracing::debug!(subscription = %id, "subscriber registered");
        Ok(id)
    }

    /// Removes a subscriber. Events already queued for it are still
    /// delivered; nothing new is queued.
    ///
    /// Returns `false` if the id is unknown.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        let removed = slots.len() != before;
        if removed {
            tracing::debug!(subscription = %id, "subscriber removed");
        }
        removed
    }

    /// Queues `event` for every subscriber, in registration order.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn dispatch(&self, event: &Arc<Event>) -> usize {
        let mut slots = self.slots.lock();
        // A closed queue means the delivery task is gone (runtime shut down).
        slots.retain(|slot| !slot.queue.is_closed());
        slots
            .iter()
            .filter(|slot| slot.queue.send(Arc::clone(event)).is_ok())
            .count()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `true` if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

async fn deliver<F>(id: SubscriptionId, mut rx: mpsc::UnboundedReceiver<Arc<Event>>, callback: F)
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    while let Some(event) = rx.recv().await {
        match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(
                subscription = %id,
                seq = event.seq(),
                event_type = event.event_type(),
                error = %err,
                "subscriber callback failed"
            ),
            Err(_) => tracing::error!(
                subscription = %id,
                seq = event.seq(),
                event_type = event.event_type(),
                "subscriber callback panicked"
            ),
        }
    }
}
