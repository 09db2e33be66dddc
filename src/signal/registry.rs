//! Connection registry — creation, linking and destruction of signals and
//! slots inside the simulation arena.
//!
//! A signal appears in a slot's link set if and only if that slot appears
//! in the signal's link set. Every mutation here updates both sides.

use std::any::Any;
use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::{SimError, SimResult};
use crate::event::EventId;
use crate::simulation::Simulation;

use super::id::{Mode, SignalId, SignalKey, SlotId, SlotKey};
use super::links::Links;

// ── Arena entries ─────────────────────────────────────────────────────

/// Per-signal bookkeeping. The payload type is erased; typed access goes
/// through `SignalId<T>`.
pub(crate) struct SignalEntry {
    pub(crate) name: String,
    pub(crate) mode: Mode,
    pub(crate) debug: bool,
    pub(crate) slots: Links<SlotKey>,
    /// Deliveries scheduled by this signal and not yet dispatched.
    /// Holds at most one entry in single-shot mode.
    pub(crate) outstanding: BTreeSet<EventId>,
}

impl SignalEntry {
    pub(crate) fn is_armed(&self) -> bool {
        !self.outstanding.is_empty()
    }
}

/// Per-slot bookkeeping.
pub(crate) struct SlotEntry {
    pub(crate) name: String,
    pub(crate) signals: Links<SignalKey>,
    /// A `Handler<T>` for the slot's payload type, or `None` while unbound.
    pub(crate) receiver: Option<Box<dyn Any>>,
}

impl Simulation {
    // ── Creation ──────────────────────────────────────────────────────

    /// Create a signal carrying values of type `T`.
    ///
    /// Its debug flag starts from `SimulationConfig::debug_signals`.
    pub fn signal<T: 'static>(&mut self, name: impl Into<String>, mode: Mode) -> SignalId<T> {
        let key = SignalKey::new(self.next_signal);
        self.next_signal += 1;
        let entry = SignalEntry {
            name: name.into(),
            mode,
            debug: self.config.debug_signals,
            slots: Links::new(),
            outstanding: BTreeSet::new(),
        };
        debug!(signal = %key, name = %entry.name, mode = %mode, "signal created");
        self.signals.insert(key, entry);
        SignalId::from_key(key)
    }

    /// Create an unbound slot accepting values of type `T`.
    pub fn slot<T: 'static>(&mut self, name: impl Into<String>) -> SlotId<T> {
        let key = SlotKey::new(self.next_slot);
        self.next_slot += 1;
        let entry = SlotEntry {
            name: name.into(),
            signals: Links::new(),
            receiver: None,
        };
        debug!(slot = %key, name = %entry.name, "slot created");
        self.slots.insert(key, entry);
        SlotId::from_key(key)
    }

    // ── Linking ───────────────────────────────────────────────────────

    /// Connect `slot` to `signal`.
    ///
    /// Returns `Ok(false)` if the pair was already connected; that is not
    /// an error, only a warning when the signal has debug mode on.
    pub fn connect<T>(&mut self, signal: SignalId<T>, slot: SlotId<T>) -> SimResult<bool> {
        let (sig, sl) = (signal.key(), slot.key());
        if !self.slots.contains_key(&sl) {
            return Err(SimError::UnknownSlot(sl));
        }
        let entry = self
            .signals
            .get_mut(&sig)
            .ok_or(SimError::UnknownSignal(sig))?;

        if !entry.slots.insert(sl) {
            if entry.debug {
                warn!(
                    signal = %entry.name,
                    slot = %self.slots[&sl].name,
                    "already connected; repeated connect has no effect"
                );
            }
            return Ok(false);
        }
        if let Some(slot_entry) = self.slots.get_mut(&sl) {
            slot_entry.signals.insert(sig);
        }
        debug!(signal = %sig, slot = %sl, "connected");
        Ok(true)
    }

    /// Disconnect `slot` from `signal`, or the oldest connected slot when
    /// `slot` is `None`.
    ///
    /// Returns the slot that was detached, or `None` if nothing matched.
    pub fn disconnect<T>(
        &mut self,
        signal: SignalId<T>,
        slot: Option<SlotId<T>>,
    ) -> SimResult<Option<SlotKey>> {
        let sig = signal.key();
        let entry = self
            .signals
            .get_mut(&sig)
            .ok_or(SimError::UnknownSignal(sig))?;

        let target = match slot {
            Some(slot) => slot.key(),
            None => match entry.slots.first() {
                Some(first) => first,
                None => return Ok(None),
            },
        };
        if !entry.slots.remove(&target) {
            return Ok(None);
        }
        self.drop_signal_link(target, sig);
        debug!(signal = %sig, slot = %target, "disconnected");
        Ok(Some(target))
    }

    /// Remove `signal` from `slot`'s side only.
    fn drop_signal_link(&mut self, slot: SlotKey, signal: SignalKey) {
        if let Some(entry) = self.slots.get_mut(&slot) {
            entry.signals.remove(&signal);
        }
    }

    /// Remove `slot` from `signal`'s side only.
    fn drop_slot_link(&mut self, signal: SignalKey, slot: SlotKey) {
        if let Some(entry) = self.signals.get_mut(&signal) {
            entry.slots.remove(&slot);
        }
    }

    // ── Destruction ───────────────────────────────────────────────────

    /// Destroy a signal: detach it from every slot and cancel all of its
    /// outstanding deliveries.
    pub fn destroy_signal<T>(&mut self, signal: SignalId<T>) -> SimResult<()> {
        self.destroy_signal_key(signal.key())
    }

    pub(crate) fn destroy_signal_key(&mut self, key: SignalKey) -> SimResult<()> {
        let entry = self
            .signals
            .remove(&key)
            .ok_or(SimError::UnknownSignal(key))?;

        for slot in entry.slots.iter() {
            self.drop_signal_link(slot, key);
        }
        for id in &entry.outstanding {
            self.scheduler.cancel(*id);
            self.deliveries.remove(id);
        }
        debug!(
            signal = %key,
            name = %entry.name,
            cancelled = entry.outstanding.len(),
            "signal destroyed"
        );
        Ok(())
    }

    /// Destroy a slot: detach it from every signal so no later trigger can
    /// reach it.
    pub fn destroy_slot<T>(&mut self, slot: SlotId<T>) -> SimResult<()> {
        self.destroy_slot_key(slot.key())
    }

    pub(crate) fn destroy_slot_key(&mut self, key: SlotKey) -> SimResult<()> {
        let entry = self.slots.remove(&key).ok_or(SimError::UnknownSlot(key))?;
        for signal in entry.signals.iter() {
            self.drop_slot_link(signal, key);
        }
        debug!(slot = %key, name = %entry.name, "slot destroyed");
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Slots connected to `signal`, in delivery order.
    pub fn connected_slots<T>(&self, signal: SignalId<T>) -> SimResult<Vec<SlotKey>> {
        let key = signal.key();
        self.signals
            .get(&key)
            .map(|e| e.slots.snapshot())
            .ok_or(SimError::UnknownSignal(key))
    }

    /// Signals connected to `slot`, in connection order.
    pub fn connected_signals<T>(&self, slot: SlotId<T>) -> SimResult<Vec<SignalKey>> {
        let key = slot.key();
        self.slots
            .get(&key)
            .map(|e| e.signals.snapshot())
            .ok_or(SimError::UnknownSlot(key))
    }

    /// Whether the pair is connected. Dead handles are simply not connected.
    pub fn is_connected<T>(&self, signal: SignalId<T>, slot: SlotId<T>) -> bool {
        self.signals
            .get(&signal.key())
            .map_or(false, |e| e.slots.contains(&slot.key()))
    }

    pub fn signal_exists(&self, key: SignalKey) -> bool {
        self.signals.contains_key(&key)
    }

    pub fn slot_exists(&self, key: SlotKey) -> bool {
        self.slots.contains_key(&key)
    }

    /// Number of live signals and slots in the arena.
    pub fn arena_len(&self) -> (usize, usize) {
        (self.signals.len(), self.slots.len())
    }

    pub fn signal_name<T>(&self, signal: SignalId<T>) -> SimResult<&str> {
        let key = signal.key();
        self.signals
            .get(&key)
            .map(|e| e.name.as_str())
            .ok_or(SimError::UnknownSignal(key))
    }

    pub fn slot_name<T>(&self, slot: SlotId<T>) -> SimResult<&str> {
        let key = slot.key();
        self.slots
            .get(&key)
            .map(|e| e.name.as_str())
            .ok_or(SimError::UnknownSlot(key))
    }

    pub fn set_slot_name<T>(&mut self, slot: SlotId<T>, name: impl Into<String>) -> SimResult<()> {
        let key = slot.key();
        let entry = self.slots.get_mut(&key).ok_or(SimError::UnknownSlot(key))?;
        entry.name = name.into();
        Ok(())
    }
}
