//! Timestamped event queue.
//!
//! Events are keyed by `(timestamp, insertion sequence)`, so events due on
//! the same tick come out in the order they were enqueued no matter how many
//! ticks pass before they are drained.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventKind, Tick};
use crate::object::InstanceId;

/// Pending events ordered by due tick, then FIFO.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueue {
    events: BTreeMap<(Tick, u64), Event>,
    next_seq: u64,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event at its own timestamp.
    pub fn enqueue(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.insert((event.timestamp, seq), event);
    }

    /// Create and enqueue an event due `delay` ticks after `now`.
    ///
    /// The timestamp is always strictly after `now`: a zero delay is raised
    /// to one tick. Returns the timestamp used.
    pub fn schedule(
        &mut self,
        kind: EventKind,
        now: Tick,
        delay: u64,
        source: InstanceId,
        replay_sourced: bool,
    ) -> Tick {
        let delay = if delay == 0 {
            tracing::warn!(now, "event scheduled for the current tick, deferring by one");
            1
        } else {
            delay
        };

        let timestamp = now + delay;
        let mut event = Event::new(kind, timestamp, source);
        event.replay_sourced = replay_sourced;
        self.enqueue(event);
        timestamp
    }

    /// Remove and return every event with `timestamp <= now`, in order.
    ///
    /// This is the only way events leave the queue.
    pub fn drain_due(&mut self, now: Tick) -> Vec<Event> {
        let later = match now.checked_add(1) {
            Some(next) => self.events.split_off(&(next, 0)),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.events, later);
        due.into_values().collect()
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the next event to come due.
    #[must_use]
    pub fn peek_timestamp(&self) -> Option<Tick> {
        self.events.keys().next().map(|(timestamp, _)| *timestamp)
    }

    /// Pending events in dispatch order.
    pub fn pending(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use proptest::prelude::*;

    fn death(target: u64, timestamp: Tick) -> Event {
        Event::new(EventKind::Death { target }, timestamp, 0)
    }

    #[test]
    fn test_drain_only_due() {
        let mut queue = EventQueue::new();
        queue.enqueue(death(1, 5));
        queue.enqueue(death(2, 3));
        queue.enqueue(death(3, 10));

        assert!(queue.drain_due(2).is_empty());
        let due = queue.drain_due(5);
        let targets: Vec<_> = due
            .iter()
            .map(|e| match e.kind {
                EventKind::Death { target } => target,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(targets, vec![2, 1]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_timestamp(), Some(10));
    }

    #[test]
    fn test_skipped_ticks_still_drain() {
        let mut queue = EventQueue::new();
        queue.enqueue(death(1, 3));
        queue.enqueue(death(2, 4));
        assert_eq!(queue.drain_due(100).len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_schedule_is_strictly_future() {
        let mut queue = EventQueue::new();
        let ts = queue.schedule(EventKind::Death { target: 1 }, 50, 0, 0, false);
        assert_eq!(ts, 51);
        assert!(queue.drain_due(50).is_empty());

        let ts = queue.schedule(EventKind::Despawn { target: 1 }, 50, 3, 2, true);
        assert_eq!(ts, 53);
        let pending: Vec<_> = queue.pending().collect();
        assert_eq!(pending[1].event_type(), EventType::Despawn);
        assert!(pending[1].replay_sourced);
        assert_eq!(pending[1].source, 2);
    }

    #[test]
    fn test_drain_at_max_tick() {
        let mut queue = EventQueue::new();
        queue.enqueue(death(1, Tick::MAX));
        assert_eq!(queue.drain_due(Tick::MAX).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_same_tick_is_fifo(count in 1usize..50, timestamp in 1u64..1000) {
            let mut queue = EventQueue::new();
            for target in 0..count {
                queue.enqueue(death(target as u64, timestamp));
            }
            let drained: Vec<_> = queue
                .drain_due(timestamp + 5)
                .into_iter()
                .map(|e| match e.kind {
                    EventKind::Death { target } => target,
                    _ => u64::MAX,
                })
                .collect();
            let expected: Vec<u64> = (0..count as u64).collect();
            prop_assert_eq!(drained, expected);
        }

        #[test]
        fn prop_never_early(stamps in prop::collection::vec(1u64..200, 1..40), now in 0u64..200) {
            let mut queue = EventQueue::new();
            for (i, ts) in stamps.iter().enumerate() {
                queue.enqueue(death(i as u64, *ts));
            }
            let due = queue.drain_due(now);
            prop_assert!(due.iter().all(|e| e.timestamp <= now));
            prop_assert!(queue.pending().all(|e| e.timestamp > now));
            prop_assert!(due.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }
}
