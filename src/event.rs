/// Scheduled delivery events.
///
/// Every pending signal delivery is represented by one `Event` on the
/// scheduler's queue. The event itself only names the signal it belongs to;
/// the payload value stays with the simulation until dispatch.

use crate::signal::SignalKey;
use crate::time::VirtualTime;
use std::cmp::Ordering;

// ── Event ID ──────────────────────────────────────────────────────────

/// A unique, strictly-increasing event identifier.
///
/// Two events scheduled at the same `VirtualTime` are ordered by their
/// `EventId`, which corresponds to creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// Token for one pending, cancellable delivery.
///
/// Returned by `Simulation::emit`; pass it to
/// `Simulation::cancel_delivery` to revoke that delivery alone.
pub type DeliveryHandle = EventId;

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// One scheduled signal delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,

    /// The virtual time at which this event should be dispatched.
    pub scheduled_at: VirtualTime,

    /// The signal whose trigger runs when the event is dispatched.
    pub signal: SignalKey,
}

impl Event {
    pub fn new(id: EventId, scheduled_at: VirtualTime, signal: SignalKey) -> Self {
        Event {
            id,
            scheduled_at,
            signal,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @{} → {}", self.id, self.scheduled_at, self.signal)
    }
}

/// Ordering: smallest `(scheduled_at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
