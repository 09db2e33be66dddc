/// Deterministic, cancellable event scheduler.
///
/// A `BinaryHeap` with reversed `Ord` on `Event` acts as a min-heap keyed
/// by `(scheduled_at, event_id)`. Cancellation is lazy: a cancelled event
/// stays in the heap and is discarded when it reaches the top.

use std::collections::{BTreeSet, BinaryHeap};

use tracing::trace;

use crate::event::{Event, EventId, EventIdGen};
use crate::signal::SignalKey;
use crate::time::VirtualTime;

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Min-heap (via reversed Ord on Event). May hold cancelled entries.
    queue: BinaryHeap<Event>,

    /// Events that are scheduled and not yet dispatched or cancelled.
    live: BTreeSet<EventId>,

    id_gen: EventIdGen,
}

impl Scheduler {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            live: BTreeSet::new(),
            id_gen: EventIdGen::new(),
        }
    }

    /// Schedule a delivery for `signal` at the given virtual time.
    pub fn schedule(&mut self, at: VirtualTime, signal: SignalKey) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, at, signal));
        self.live.insert(id);
        trace!(event = %id, at = %at, signal = %signal, "event queued");
        id
    }

    /// Invalidate a scheduled event.
    ///
    /// Returns `false` if the event was already dispatched, already
    /// cancelled, or never existed. That case is a harmless no-op.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.live.remove(&id)
    }

    /// Whether `id` is still waiting for dispatch.
    pub fn is_live(&self, id: EventId) -> bool {
        self.live.contains(&id)
    }

    /// Pop the next live event (earliest time, lowest ID).
    pub fn pop_next(&mut self) -> Option<Event> {
        while let Some(event) = self.queue.pop() {
            if self.live.remove(&event.id) {
                return Some(event);
            }
        }
        None
    }

    /// Due time of the next live event, discarding cancelled heads.
    pub fn next_due(&mut self) -> Option<VirtualTime> {
        while let Some(head) = self.queue.peek() {
            if self.live.contains(&head.id) {
                return Some(head.scheduled_at);
            }
            self.queue.pop();
        }
        None
    }

    /// Returns `true` if no live event is pending.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of live (non-cancelled) pending events.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Drain all live events in dispatch order.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.live.len());
        while let Some(e) = self.pop_next() {
            events.push(e);
        }
        self.queue.clear();
        events
    }
}
