//! `Timer` — fire a handler once at a future instant, re-settable.
//!
//! A timer is a private single-shot signal carrying its expiration time,
//! wired to a private slot that clears the pending state and then calls
//! the user's handler with that time.
//!
//! ```text
//!   Idle ──set/set_at──▶ Pending ──dispatch──▶ Idle (handler runs once)
//!    ▲                      │
//!    └────────reset─────────┘   (set while Pending re-arms)
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::warn;

use crate::error::{SimError, SimResult};
use crate::signal::{owner_handler, Mode, SignalId, SlotId};
use crate::simulation::{EntryGuard, Simulation};
use crate::time::VirtualTime;

pub struct Timer {
    name: String,
    signal: SignalId<VirtualTime>,
    slot: SlotId<VirtualTime>,
    /// `Some(expiration)` exactly while the internal signal is armed.
    expiration: Rc<Cell<Option<VirtualTime>>>,
    guard: EntryGuard,
}

impl Timer {
    /// Create an idle timer that calls `handler` on `owner` when it expires.
    ///
    /// Only a weak reference to `owner` is kept. Expiring while the owner
    /// is inside another of its handlers defers the call the same way a
    /// bound slot does.
    pub fn new<O: 'static>(
        sim: &mut Simulation,
        name: impl Into<String>,
        owner: &Rc<RefCell<O>>,
        handler: fn(&mut O, &mut Simulation, VirtualTime),
    ) -> Self {
        let handler = owner_handler(owner, handler);
        Self::build(sim, name.into(), move |sim: &mut Simulation, at: VirtualTime| {
            handler(sim, at)
        })
    }

    /// Create an idle timer with a closure handler.
    pub fn with_fn(
        sim: &mut Simulation,
        name: impl Into<String>,
        handler: impl Fn(&mut Simulation, VirtualTime) + 'static,
    ) -> Self {
        Self::build(sim, name.into(), handler)
    }

    fn build(
        sim: &mut Simulation,
        name: String,
        handler: impl Fn(&mut Simulation, VirtualTime) + 'static,
    ) -> Self {
        let signal = sim.signal::<VirtualTime>(name.clone(), Mode::SingleShot);
        let slot = sim.slot::<VirtualTime>(name.clone());
        let expiration = Rc::new(Cell::new(None));

        let state = Rc::clone(&expiration);
        sim.bind_fn(slot, move |sim: &mut Simulation, at: VirtualTime| {
            state.set(None);
            handler(sim, at);
        })
        .expect("freshly created slot exists");
        sim.set_debug(signal, false)
            .expect("freshly created signal exists");
        sim.connect(signal, slot)
            .expect("freshly created signal and slot exist");

        let guard = EntryGuard::new(sim, signal.key(), slot.key());
        Timer {
            name,
            signal,
            slot,
            expiration,
            guard,
        }
    }

    /// Expire `delay` ticks from now, replacing any pending expiration.
    pub fn set(&self, sim: &mut Simulation, delay: u64) -> SimResult<()> {
        let now = sim.now();
        let at = now.plus(delay).ok_or(SimError::TimeOverflow {
            now: now.ticks(),
            delay,
        })?;
        self.arm(sim, at, delay)
    }

    /// Expire at the absolute instant `at`, replacing any pending
    /// expiration.
    ///
    /// An instant already in the past is clamped to now: the timer fires on
    /// the next dispatch and reports the current time as its expiration.
    pub fn set_at(&self, sim: &mut Simulation, at: VirtualTime) -> SimResult<()> {
        let now = sim.now();
        match at.duration_since(now) {
            Some(delay) => self.arm(sim, at, delay),
            None => {
                warn!(timer = %self.name, requested = %at, now = %now, "timer set in the past; firing immediately");
                self.arm(sim, now, 0)
            }
        }
    }

    fn arm(&self, sim: &mut Simulation, at: VirtualTime, delay: u64) -> SimResult<()> {
        // Single-shot: emitting while armed replaces the pending delivery.
        sim.emit(self.signal, at, delay)?;
        self.expiration.set(Some(at));
        Ok(())
    }

    /// Return to idle without running the handler. No-op when idle.
    pub fn reset(&self, sim: &mut Simulation) -> SimResult<()> {
        if self.is_pending() {
            sim.cancel(self.signal)?;
            self.expiration.set(None);
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.expiration.get().is_some()
    }

    /// The instant the pending expiration is due.
    ///
    /// # Panics
    /// Panics if the timer is not pending. Use
    /// [`try_expiration_time`](Self::try_expiration_time) to check instead.
    pub fn expiration_time(&self) -> VirtualTime {
        match self.try_expiration_time() {
            Ok(at) => at,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_expiration_time(&self) -> SimResult<VirtualTime> {
        self.expiration
            .get()
            .ok_or_else(|| SimError::TimerNotPending(self.name.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the timer and its internal signal and slot.
    pub fn set_name(&mut self, sim: &mut Simulation, name: impl Into<String>) -> SimResult<()> {
        self.name = name.into();
        sim.set_name(self.signal, self.name.clone())?;
        sim.set_slot_name(self.slot, self.name.clone())
    }

    /// Tear the timer down now, cancelling a pending expiration.
    ///
    /// Dropping the timer has the same effect, applied before the
    /// simulation's next dispatch.
    pub fn destroy(self, sim: &mut Simulation) -> SimResult<()> {
        self.expiration.set(None);
        self.guard.destroy(sim)
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("expiration", &self.expiration.get())
            .finish()
    }
}
