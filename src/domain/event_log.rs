//! Append-only, ordered log of decoded events.
//!
//! [`EventLog`] is written by exactly one path (the session driver) and read
//! by any number of consumers. Readers take a short read lock and copy out
//! `Arc<Event>` pointers, so a snapshot never holds up ingestion for longer
//! than a pointer copy.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Event;

/// How much history the log keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every event for the lifetime of the session.
    #[default]
    Unbounded,
    /// Keep at most this many events, evicting the oldest first.
    Capped(usize),
}

impl RetentionPolicy {
    /// Maps a capacity setting to a policy; `0` means unbounded.
    #[must_use]
    pub const fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::Unbounded
        } else {
            Self::Capped(capacity)
        }
    }
}

#[derive(Debug, Default)]
struct LogInner {
    events: VecDeque<Arc<Event>>,
    appended: u64,
    evicted: u64,
}

/// Ordered event history shared with every consumer.
///
/// Insertion order is arrival order. Entries are never reordered or
/// modified; under [`RetentionPolicy::Capped`] the oldest entries are
/// dropped from the front.
#[derive(Debug, Default)]
pub struct EventLog {
    inner: RwLock<LogInner>,
    retention: RetentionPolicy,
}

impl EventLog {
    /// Creates an empty log with the given retention policy.
    #[must_use]
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            inner: RwLock::new(LogInner::default()),
            retention,
        }
    }

    /// Assigns the next sequence number and appends the event.
    pub(crate) fn append(&self, event: Event) -> Arc<Event> {
        let mut inner = self.inner.write();
        inner.appended = inner.appended.saturating_add(1);
        let event = Arc::new(event.with_seq(inner.appended));
        inner.events.push_back(Arc::clone(&event));

        if let RetentionPolicy::Capped(cap) = self.retention {
            while inner.events.len() > cap {
                inner.events.pop_front();
                inner.evicted = inner.evicted.saturating_add(1);
            }
        }
        event
    }

    /// Returns a copy of the retained events in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.inner.read().events.iter().cloned().collect()
    }

    /// Returns the retained events with a sequence number greater than `seq`.
    ///
    /// Consumers that remember the last `seq` they processed can use this
    /// to read only the suffix they have not seen.
    #[must_use]
    pub fn since(&self, seq: u64) -> Vec<Arc<Event>> {
        let inner = self.inner.read();
        let start = inner.events.partition_point(|e| e.seq() <= seq);
        inner.events.range(start..).cloned().collect()
    }

    /// Returns the most recently appended event.
    #[must_use]
    pub fn last(&self) -> Option<Arc<Event>> {
        self.inner.read().events.back().cloned()
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    /// Returns `true` if no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }

    /// Total events appended since creation, including evicted ones.
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.inner.read().appended
    }

    /// Events dropped by the retention policy.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.inner.read().evicted
    }

    /// The configured retention policy.
    #[must_use]
    pub const fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> Event {
        let frame = format!(r#"{{"type":"{event_type}"}}"#);
        let Ok(event) = Event::decode(&frame) else {
            panic!("test frame must decode");
        };
        event
    }

    fn types(events: &[Arc<Event>]) -> Vec<String> {
        events.iter().map(|e| e.event_type().to_string()).collect()
    }

    #[test]
    fn append_assigns_sequential_seq() {
        let log = EventLog::new(RetentionPolicy::Unbounded);
        let a = log.append(event("flights"));
        let b = log.append(event("plane"));
        assert_eq!(a.seq(), 1);
        assert_eq!(b.seq(), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_appended(), 2);
    }

    #[test]
    fn snapshot_preserves_arrival_order() {
        let log = EventLog::new(RetentionPolicy::Unbounded);
        for t in ["flights", "plane", "landing", "take-off"] {
            log.append(event(t));
        }
        assert_eq!(
            types(&log.snapshot()),
            vec!["flights", "plane", "landing", "take-off"]
        );
    }

    #[test]
    fn snapshot_is_unaffected_by_later_appends() {
        let log = EventLog::new(RetentionPolicy::Unbounded);
        log.append(event("flights"));
        let snapshot = log.snapshot();
        log.append(event("plane"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn since_returns_unseen_suffix() {
        let log = EventLog::new(RetentionPolicy::Unbounded);
        for t in ["flights", "plane", "crashed"] {
            log.append(event(t));
        }
        assert_eq!(types(&log.since(1)), vec!["plane", "crashed"]);
        assert!(log.since(3).is_empty());
        assert_eq!(log.since(0).len(), 3);
    }

    #[test]
    fn capped_log_evicts_oldest_first() {
        let log = EventLog::new(RetentionPolicy::Capped(2));
        for t in ["flights", "plane", "crashed"] {
            log.append(event(t));
        }
        assert_eq!(types(&log.snapshot()), vec!["plane", "crashed"]);
        assert_eq!(log.evicted(), 1);
        assert_eq!(log.total_appended(), 3);

        let Some(last) = log.last() else {
            panic!("log must not be empty");
        };
        assert_eq!(last.seq(), 3);
        assert_eq!(types(&log.since(0)), vec!["plane", "crashed"]);
    }

    #[test]
    fn zero_capacity_means_unbounded() {
        assert_eq!(RetentionPolicy::from_capacity(0), RetentionPolicy::Unbounded);
        assert_eq!(RetentionPolicy::from_capacity(5), RetentionPolicy::Capped(5));
    }

    #[test]
    fn empty_log() {
        let log = EventLog::default();
        assert!(log.is_empty());
        assert!(log.last().is_none());
        assert_eq!(log.retention(), RetentionPolicy::Unbounded);
    }
}
