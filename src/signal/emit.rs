//! Emitting, cancelling and triggering signals.

use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::event::{DeliveryHandle, EventId};
use crate::simulation::{PendingDelivery, Simulation};
use crate::trace::DeliveryRecord;

use super::id::{Mode, SignalId, SignalKey, SlotKey};

impl Simulation {
    /// Schedule delivery of `value` to every connected slot `delay` ticks
    /// from now.
    ///
    /// - Continuous mode: always adds a new, independent delivery.
    /// - Single-shot mode: if a delivery is already outstanding it is
    ///   cancelled first, so exactly one remains, carrying this value and
    ///   due at this delay.
    ///
    /// A `delay` of 0 is due on the next dispatch, never delivered inline.
    pub fn emit<T: Clone + 'static>(
        &mut self,
        signal: SignalId<T>,
        value: T,
        delay: u64,
    ) -> SimResult<DeliveryHandle> {
        let key = signal.key();
        let now = self.current_time;
        let at = now.plus(delay).ok_or(SimError::TimeOverflow {
            now: now.ticks(),
            delay,
        })?;
        let entry = self.signals.get(&key).ok_or(SimError::UnknownSignal(key))?;

        if entry.mode == Mode::SingleShot && entry.is_armed() {
            if entry.debug {
                warn!(signal = %entry.name, delay, "re-arming single-shot signal; pending delivery replaced");
            }
            self.cancel_outstanding(key);
        }

        let id = self.scheduler.schedule(at, key);
        self.deliveries.insert(
            id,
            PendingDelivery {
                signal: key,
                fire: Box::new(move |sim: &mut Simulation, id: EventId| {
                    sim.fan_out(key, value, Some(id));
                }),
            },
        );
        if let Some(entry) = self.signals.get_mut(&key) {
            entry.outstanding.insert(id);
        }
        debug!(signal = %key, event = %id, at = %at, "delivery scheduled");
        Ok(id)
    }

    /// Cancel the outstanding delivery of a single-shot signal.
    ///
    /// Returns `true` if a delivery was cancelled. Continuous signals and
    /// idle signals are left untouched.
    pub fn cancel<T>(&mut self, signal: SignalId<T>) -> SimResult<bool> {
        let key = signal.key();
        let entry = self.signals.get(&key).ok_or(SimError::UnknownSignal(key))?;
        if entry.mode != Mode::SingleShot || !entry.is_armed() {
            return Ok(false);
        }
        self.cancel_outstanding(key);
        Ok(true)
    }

    /// Revoke one scheduled delivery by its handle, whatever the mode.
    ///
    /// Returns `false` if the delivery already fired or was cancelled.
    pub fn cancel_delivery(&mut self, handle: DeliveryHandle) -> bool {
        if !self.scheduler.cancel(handle) {
            return false;
        }
        if let Some(delivery) = self.deliveries.remove(&handle) {
            self.release(delivery.signal, handle);
        }
        debug!(event = %handle, "delivery cancelled");
        true
    }

    /// Deliver `value` immediately to every connected slot, bypassing the
    /// scheduler.
    ///
    /// The signal is disarmed first: a pending single-shot delivery is
    /// cancelled so it cannot fire on top of this one. Returns the number
    /// of slots whose handler ran.
    pub fn trigger<T: Clone + 'static>(
        &mut self,
        signal: SignalId<T>,
        value: T,
    ) -> SimResult<usize> {
        let key = signal.key();
        let entry = self.signals.get(&key).ok_or(SimError::UnknownSignal(key))?;
        if entry.mode == Mode::SingleShot {
            self.cancel_outstanding(key);
        }
        Ok(self.fan_out(key, value, None))
    }

    /// Whether the signal has at least one delivery outstanding.
    pub fn is_armed<T>(&self, signal: SignalId<T>) -> SimResult<bool> {
        let key = signal.key();
        self.signals
            .get(&key)
            .map(|e| e.is_armed())
            .ok_or(SimError::UnknownSignal(key))
    }

    /// Handles of every outstanding delivery, oldest first.
    pub fn outstanding<T>(&self, signal: SignalId<T>) -> SimResult<Vec<DeliveryHandle>> {
        let key = signal.key();
        self.signals
            .get(&key)
            .map(|e| e.outstanding.iter().copied().collect())
            .ok_or(SimError::UnknownSignal(key))
    }

    pub fn mode<T>(&self, signal: SignalId<T>) -> SimResult<Mode> {
        let key = signal.key();
        self.signals
            .get(&key)
            .map(|e| e.mode)
            .ok_or(SimError::UnknownSignal(key))
    }

    pub fn set_name<T>(&mut self, signal: SignalId<T>, name: impl Into<String>) -> SimResult<()> {
        let key = signal.key();
        let entry = self
            .signals
            .get_mut(&key)
            .ok_or(SimError::UnknownSignal(key))?;
        entry.name = name.into();
        Ok(())
    }

    /// Enable or disable per-delivery diagnostics for this signal.
    pub fn set_debug<T>(&mut self, signal: SignalId<T>, enabled: bool) -> SimResult<()> {
        let key = signal.key();
        let entry = self
            .signals
            .get_mut(&key)
            .ok_or(SimError::UnknownSignal(key))?;
        entry.debug = enabled;
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────

    /// Cancel every outstanding delivery of `key`.
    fn cancel_outstanding(&mut self, key: SignalKey) {
        let Some(entry) = self.signals.get_mut(&key) else {
            return;
        };
        for id in std::mem::take(&mut entry.outstanding) {
            self.scheduler.cancel(id);
            self.deliveries.remove(&id);
            debug!(signal = %key, event = %id, "delivery cancelled");
        }
    }

    /// Clear ownership of a delivery that is about to run or was revoked.
    pub(crate) fn release(&mut self, key: SignalKey, id: EventId) {
        if let Some(entry) = self.signals.get_mut(&key) {
            entry.outstanding.remove(&id);
        }
    }

    /// Hand `value` to each connected slot in connection order.
    ///
    /// Iterates over a snapshot. A slot that an earlier handler in the same
    /// fan-out disconnected or destroyed is skipped, and the fan-out stops
    /// if the signal itself is destroyed.
    pub(crate) fn fan_out<T: Clone + 'static>(
        &mut self,
        key: SignalKey,
        value: T,
        event_id: Option<EventId>,
    ) -> usize {
        let Some(entry) = self.signals.get(&key) else {
            return 0;
        };
        let targets = entry.slots.snapshot();
        let mut delivered = 0;

        for slot in targets {
            let Some(entry) = self.signals.get(&key) else {
                break;
            };
            if !entry.slots.contains(&slot) {
                continue;
            }
            if entry.debug {
                self.log_delivery(key, slot, event_id);
            }
            if self.invoke(slot, value.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    fn log_delivery(&mut self, key: SignalKey, slot: SlotKey, event_id: Option<EventId>) {
        let signal_name = self.signals.get(&key).map(|e| e.name.clone()).unwrap_or_default();
        let slot_name = self.slots.get(&slot).map(|e| e.name.clone()).unwrap_or_default();
        info!(
            time = self.current_time.ticks(),
            signal = %signal_name,
            slot = %slot_name,
            "signal delivered"
        );
        if self.config.record_trace {
            self.trace.push(DeliveryRecord {
                time: self.current_time,
                event_id,
                signal: key,
                signal_name,
                slot,
                slot_name,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::signal::Mode;
    use crate::simulation::Simulation;
    use crate::testing::capture_logs;
    use crate::time::VirtualTime;

    fn recorder(sim: &mut Simulation) -> (crate::SlotId<u32>, Rc<RefCell<Vec<(u64, u32)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let slot = sim.slot::<u32>("rec");
        let sink = Rc::clone(&seen);
        sim.bind_fn(slot, move |sim: &mut Simulation, v: u32| {
            sink.borrow_mut().push((sim.now().ticks(), v));
        })
        .unwrap();
        (slot, seen)
    }

    #[test]
    fn test_emit_delivers_after_delay() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::Continuous);
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        sim.emit(s, 7, 4).unwrap();
        assert!(sim.is_armed(s).unwrap());
        assert!(seen.borrow().is_empty());

        sim.run();
        assert_eq!(*seen.borrow(), vec![(4, 7)]);
        assert!(!sim.is_armed(s).unwrap());
    }

    #[test]
    fn test_zero_delay_is_not_inline() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::Continuous);
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        sim.emit(s, 1, 0).unwrap();
        assert!(seen.borrow().is_empty());
        sim.step();
        assert_eq!(*seen.borrow(), vec![(0, 1)]);
    }

    #[test]
    fn test_continuous_keeps_every_delivery() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::Continuous);
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        sim.emit(s, 1, 10).unwrap();
        sim.emit(s, 2, 5).unwrap();
        assert_eq!(sim.outstanding(s).unwrap().len(), 2);
        // cancel() is a no-op in continuous mode.
        assert!(!sim.cancel(s).unwrap());

        sim.run();
        assert_eq!(*seen.borrow(), vec![(5, 2), (10, 1)]);
    }

    #[test]
    fn test_single_shot_rearm_replaces() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::SingleShot);
        sim.set_debug(s, true).unwrap();
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        let first = sim.emit(s, 1, 10).unwrap();
        let (second, logs) = capture_logs(|| sim.emit(s, 2, 3));
        let second = second.unwrap();
        assert!(logs.contains("pending delivery replaced"));
        assert_ne!(first, second);
        assert_eq!(sim.outstanding(s).unwrap(), vec![second]);
        assert_eq!(sim.pending_count(), 1);

        sim.run();
        assert_eq!(*seen.borrow(), vec![(3, 2)]);
    }

    #[test]
    fn test_cancel_is_final() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::SingleShot);
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        sim.emit(s, 9, 10).unwrap();
        assert!(sim.cancel(s).unwrap());
        assert!(!sim.cancel(s).unwrap());
        sim.run_until(VirtualTime::new(50));

        assert!(seen.borrow().is_empty());
        assert!(!sim.is_armed(s).unwrap());
    }

    #[test]
    fn test_cancel_delivery_by_handle() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::Continuous);
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        let a = sim.emit(s, 1, 2).unwrap();
        sim.emit(s, 2, 4).unwrap();
        assert!(sim.cancel_delivery(a));
        assert!(!sim.cancel_delivery(a));
        assert_eq!(sim.outstanding(s).unwrap().len(), 1);

        sim.run();
        assert_eq!(*seen.borrow(), vec![(4, 2)]);
    }

    #[test]
    fn test_trigger_disarms_single_shot() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("s", Mode::SingleShot);
        let (k, seen) = recorder(&mut sim);
        sim.connect(s, k).unwrap();

        sim.emit(s, 1, 10).unwrap();
        assert_eq!(sim.trigger(s, 5).unwrap(), 1);
        assert!(!sim.is_armed(s).unwrap());

        sim.run();
        assert_eq!(*seen.borrow(), vec![(0, 5)]);
    }

    #[test]
    fn test_emit_overflow_is_error() {
        let mut sim = Simulation::new();
        sim.run_until(VirtualTime::new(10));
        let s = sim.signal::<u32>("s", Mode::SingleShot);
        let err = sim.emit(s, 0, u64::MAX).unwrap_err();
        assert_eq!(err, crate::SimError::TimeOverflow { now: 10, delay: u64::MAX });
        assert!(!sim.is_armed(s).unwrap());
    }

    #[test]
    fn test_debug_delivery_is_traced() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u32>("A_signal", Mode::Continuous);
        let quiet = sim.signal::<u32>("quiet", Mode::Continuous);
        sim.set_debug(s, true).unwrap();
        let (k, _seen) = recorder(&mut sim);
        sim.set_slot_name(k, "B_slot").unwrap();
        sim.connect(s, k).unwrap();
        sim.connect(quiet, k).unwrap();

        let id = sim.emit(s, 1, 6).unwrap();
        sim.emit(quiet, 2, 7).unwrap();
        sim.run();

        assert_eq!(sim.trace.len(), 1);
        let rec = &sim.trace[0];
        assert_eq!(rec.time, VirtualTime::new(6));
        assert_eq!(rec.event_id, Some(id));
        assert_eq!(rec.signal_name, "A_signal");
        assert_eq!(rec.slot_name, "B_slot");
    }
}
