//! DeliveryRecord — one diagnostic line per debug-enabled delivery.

use crate::event::EventId;
use crate::signal::{SignalKey, SlotKey};
use crate::time::VirtualTime;

/// A record of a single signal-to-slot delivery.
///
/// Appended by the simulation when the delivering signal has debug mode on
/// and trace recording is enabled in the config. Useful for test assertions
/// and post-mortem debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DeliveryRecord {
    /// Virtual time of the delivery.
    pub time: VirtualTime,
    /// The scheduled event, or `None` for a direct `trigger`.
    pub event_id: Option<EventId>,
    pub signal: SignalKey,
    pub signal_name: String,
    pub slot: SlotKey,
    pub slot_name: String,
}

impl std::fmt::Display for DeliveryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.event_id {
            Some(id) => write!(f, "[T={} {}] ", self.time.ticks(), id)?,
            None => write!(f, "[T={} direct] ", self.time.ticks())?,
        }
        write!(f, "'{}' → '{}'", self.signal_name, self.slot_name)
    }
}
