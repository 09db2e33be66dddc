//! `Alarm<T>` — a single-shot timer that delivers a value.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::SimResult;
use crate::event::DeliveryHandle;
use crate::signal::{Mode, SignalId, SlotId};
use crate::simulation::{EntryGuard, Simulation};

/// Single-shot signal and slot pre-wired together.
///
/// Where [`Timer`](crate::Timer) reports its expiration time, an alarm
/// carries an arbitrary payload chosen at `set` time. Setting it again
/// while armed replaces both the payload and the due time.
pub struct Alarm<T> {
    name: String,
    signal: SignalId<T>,
    slot: SlotId<T>,
    guard: EntryGuard,
}

impl<T: Clone + 'static> Alarm<T> {
    /// Create an idle, unbound alarm.
    pub fn new(sim: &mut Simulation, name: impl Into<String>) -> Self {
        let name = name.into();
        let signal = sim.signal::<T>(name.clone(), Mode::SingleShot);
        let slot = sim.slot::<T>(name.clone());
        sim.connect(signal, slot)
            .expect("freshly created signal and slot exist");
        let guard = EntryGuard::new(sim, signal.key(), slot.key());
        Alarm {
            name,
            signal,
            slot,
            guard,
        }
    }

    /// Route the alarm into `handler` on `owner` (weakly held).
    pub fn forward<O: 'static>(
        &self,
        sim: &mut Simulation,
        owner: &Rc<RefCell<O>>,
        handler: fn(&mut O, &mut Simulation, T),
    ) -> SimResult<()> {
        sim.bind(self.slot, owner, handler)
    }

    /// Route the alarm into a closure.
    pub fn forward_fn(
        &self,
        sim: &mut Simulation,
        f: impl Fn(&mut Simulation, T) + 'static,
    ) -> SimResult<()> {
        sim.bind_fn(self.slot, f)
    }

    /// Deliver `value` after `delay` ticks, replacing a pending delivery.
    pub fn set(&self, sim: &mut Simulation, value: T, delay: u64) -> SimResult<DeliveryHandle> {
        sim.emit(self.signal, value, delay)
    }

    /// Drop the pending delivery, if any. Returns whether one was pending.
    pub fn cancel(&self, sim: &mut Simulation) -> SimResult<bool> {
        sim.cancel(self.signal)
    }

    pub fn is_armed(&self, sim: &Simulation) -> SimResult<bool> {
        sim.is_armed(self.signal)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, sim: &mut Simulation, name: impl Into<String>) -> SimResult<()> {
        self.name = name.into();
        sim.set_name(self.signal, self.name.clone())?;
        sim.set_slot_name(self.slot, self.name.clone())
    }

    /// Enable per-delivery diagnostics on the internal signal.
    pub fn set_debug(&self, sim: &mut Simulation, enabled: bool) -> SimResult<()> {
        sim.set_debug(self.signal, enabled)
    }

    /// Tear the alarm down now. Dropping it has the same effect before the
    /// next dispatch.
    pub fn destroy(self, sim: &mut Simulation) -> SimResult<()> {
        self.guard.destroy(sim)
    }
}
