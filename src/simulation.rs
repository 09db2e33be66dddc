/// Simulation execution loop.
///
/// Owns the scheduler, the virtual clock and the signal/slot arena. Pops
/// due deliveries, advances virtual time, and runs each signal's fan-out.
/// The loop is purely synchronous and single-threaded.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::SimulationConfig;
use crate::error::SimResult;
use crate::event::{Event, EventId};
use crate::scheduler::Scheduler;
use crate::signal::registry::{SignalEntry, SlotEntry};
use crate::signal::{SignalKey, SlotKey};
use crate::time::VirtualTime;
use crate::trace::DeliveryRecord;

// ── Pending deliveries ────────────────────────────────────────────────

/// The typed half of a scheduled event: the payload value, captured in a
/// closure that runs the owning signal's fan-out.
pub(crate) struct PendingDelivery {
    pub(crate) signal: SignalKey,
    pub(crate) fire: Box<dyn FnOnce(&mut Simulation, EventId)>,
}

// ── Orphans ───────────────────────────────────────────────────────────

/// Arena entries whose owning handle was dropped without being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orphan {
    Signal(SignalKey),
    Slot(SlotKey),
}

/// Shared drop-box between the simulation and the handles that own arena
/// entries (`Timer`, `Alarm`). Handles push on drop; the simulation reaps
/// before the next dispatch.
pub(crate) type Orphans = Rc<RefCell<Vec<Orphan>>>;

/// Owns one signal and one slot on behalf of a handle.
///
/// `destroy` tears both down immediately. Dropping the guard instead
/// queues them on the orphan list, so nothing the handle armed can fire
/// after the handle is gone.
pub(crate) struct EntryGuard {
    signal: SignalKey,
    slot: SlotKey,
    orphans: Orphans,
    live: bool,
}

impl EntryGuard {
    pub(crate) fn new(sim: &Simulation, signal: SignalKey, slot: SlotKey) -> Self {
        EntryGuard {
            signal,
            slot,
            orphans: Rc::clone(&sim.orphans),
            live: true,
        }
    }

    pub(crate) fn destroy(mut self, sim: &mut Simulation) -> SimResult<()> {
        self.live = false;
        let signal = sim.destroy_signal_key(self.signal);
        let slot = sim.destroy_slot_key(self.slot);
        signal.and(slot)
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        if self.live {
            let mut orphans = self.orphans.borrow_mut();
            orphans.push(Orphan::Signal(self.signal));
            orphans.push(Orphan::Slot(self.slot));
        }
    }
}

// ── Scope marks ──────────────────────────────────────────────────────

/// Increments a shared depth counter for as long as it lives. The
/// decrement also happens when a handler unwinds.
pub(crate) struct ScopeMark(Rc<Cell<u32>>);

impl ScopeMark {
    pub(crate) fn enter(depth: &Rc<Cell<u32>>) -> Self {
        depth.set(depth.get() + 1);
        ScopeMark(Rc::clone(depth))
    }
}

impl Drop for ScopeMark {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Call `run` to execute until the queue is drained, `run_until` to stop
/// at a given instant, or `step` to advance by exactly one delivery.
pub struct Simulation {
    pub(crate) scheduler: Scheduler,
    pub(crate) current_time: VirtualTime,
    events_processed: u64,
    pub(crate) config: SimulationConfig,

    pub(crate) signals: BTreeMap<SignalKey, SignalEntry>,
    pub(crate) slots: BTreeMap<SlotKey, SlotEntry>,
    pub(crate) next_signal: u64,
    pub(crate) next_slot: u64,

    /// Payload closures keyed by the event that will run them.
    pub(crate) deliveries: BTreeMap<EventId, PendingDelivery>,
    pub(crate) orphans: Orphans,
    /// Nesting depth of `step` fan-outs; non-zero only inside a handler.
    dispatching: Rc<Cell<u32>>,
    /// Nesting depth of slot handler calls.
    pub(crate) handler_depth: Rc<Cell<u32>>,
    /// Owner-bound deliveries that found their owner already borrowed.
    pub(crate) deferred: VecDeque<Box<dyn FnOnce(&mut Simulation)>>,

    /// Deliveries made by debug-enabled signals, in order.
    pub trace: Vec<DeliveryRecord>,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Simulation {
            scheduler: Scheduler::new(),
            current_time: config.start_time,
            events_processed: 0,
            config,
            signals: BTreeMap::new(),
            slots: BTreeMap::new(),
            next_signal: 0,
            next_slot: 0,
            deliveries: BTreeMap::new(),
            orphans: Rc::new(RefCell::new(Vec::new())),
            dispatching: Rc::new(Cell::new(0)),
            handler_depth: Rc::new(Cell::new(0)),
            deferred: VecDeque::new(),
            trace: Vec::new(),
        }
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.current_time
    }

    /// Alias of [`now`](Self::now).
    #[inline]
    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Total deliveries dispatched so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Number of deliveries waiting in the scheduler.
    ///
    /// Deliveries armed by a `Timer` or `Alarm` that has since been
    /// dropped are excluded, even before the next dispatch reaps them.
    pub fn pending_count(&self) -> usize {
        let orphans = self.orphans.borrow();
        let orphaned: usize = orphans
            .iter()
            .filter_map(|o| match o {
                Orphan::Signal(key) => self.signals.get(key),
                Orphan::Slot(_) => None,
            })
            .map(|entry| entry.outstanding.len())
            .sum();
        self.scheduler.len().saturating_sub(orphaned)
    }

    /// Returns `true` if there are no more deliveries to process.
    ///
    /// Like [`pending_count`](Self::pending_count), ignores deliveries
    /// owned by a dropped `Timer` or `Alarm`.
    pub fn is_finished(&self) -> bool {
        self.pending_count() == 0
    }

    /// Execute a single step: pop one delivery, advance time, fan out.
    ///
    /// Returns `Some(event)` if a delivery was processed, `None` if the
    /// queue is empty.
    ///
    /// # Panics
    /// Panics if called from inside a slot handler.
    pub fn step(&mut self) -> Option<Event> {
        assert!(
            self.dispatching.get() == 0,
            "Simulation::step called re-entrantly from a slot handler"
        );
        self.reap_orphans();
        let event = self.scheduler.pop_next()?;

        // Virtual time must never go backward.
        assert!(
            event.scheduled_at >= self.current_time,
            "Time went backward! current={}, event={}",
            self.current_time,
            event.scheduled_at
        );
        self.current_time = event.scheduled_at;
        self.events_processed += 1;

        if let Some(delivery) = self.deliveries.remove(&event.id) {
            // Ownership is cleared before fan-out, so a handler that
            // re-arms this signal sees it idle.
            self.release(delivery.signal, event.id);
            trace!(event = %event, "dispatching");
            let _mark = ScopeMark::enter(&self.dispatching);
            (delivery.fire)(self, event.id);
        }

        Some(event)
    }

    /// Run until the queue is empty.
    ///
    /// Returns the number of deliveries processed during this run.
    pub fn run(&mut self) -> u64 {
        let start = self.events_processed;
        while self.step().is_some() {}
        self.events_processed - start
    }

    /// Run until the queue is empty **or** `max_steps` deliveries have
    /// been dispatched, whichever comes first.
    pub fn run_for(&mut self, max_steps: u64) -> u64 {
        let start = self.events_processed;
        let mut steps = 0u64;
        while steps < max_steps {
            if self.step().is_none() {
                break;
            }
            steps += 1;
        }
        self.events_processed - start
    }

    /// Dispatch every delivery due at or before `until`, then move the
    /// clock to `until`. A target in the past leaves the clock unchanged.
    pub fn run_until(&mut self, until: VirtualTime) -> u64 {
        let start = self.events_processed;
        loop {
            self.reap_orphans();
            match self.scheduler.next_due() {
                Some(at) if at <= until => {
                    self.step();
                }
                _ => break,
            }
        }
        if self.current_time < until {
            self.current_time = until;
        }
        let processed = self.events_processed - start;
        debug!(now = %self.current_time, processed, "ran until");
        processed
    }

    /// Destroy arena entries whose owners were dropped.
    pub(crate) fn reap_orphans(&mut self) {
        let orphans = std::mem::take(&mut *self.orphans.borrow_mut());
        for orphan in orphans {
            // Already gone if the owner raced an explicit destroy.
            let _ = match orphan {
                Orphan::Signal(key) => self.destroy_signal_key(key),
                Orphan::Slot(key) => self.destroy_slot_key(key),
            };
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.current_time)
            .field("pending", &self.scheduler.len())
            .field("signals", &self.signals.len())
            .field("slots", &self.slots.len())
            .field("events_processed", &self.events_processed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Mode;

    fn logger(sim: &mut Simulation) -> (crate::SignalId<&'static str>, Rc<RefCell<Vec<(u64, &'static str)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let s = sim.signal::<&'static str>("log", Mode::Continuous);
        let k = sim.slot::<&'static str>("log");
        let sink = Rc::clone(&log);
        sim.bind_fn(k, move |sim: &mut Simulation, msg: &'static str| {
            sink.borrow_mut().push((sim.now().ticks(), msg));
        })
        .unwrap();
        sim.connect(s, k).unwrap();
        (s, log)
    }

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();
        let (s, log) = logger(&mut sim);

        sim.emit(s, "a", 10).unwrap();
        sim.emit(s, "b", 20).unwrap();
        sim.emit(s, "c", 30).unwrap();

        assert_eq!(sim.run(), 3);
        assert_eq!(*log.borrow(), vec![(10, "a"), (20, "b"), (30, "c")]);
        assert_eq!(sim.current_time(), VirtualTime::new(30));
        assert!(sim.is_finished());
    }

    #[test]
    fn test_handler_schedules_followup() {
        let mut sim = Simulation::new();
        let s = sim.signal::<u64>("tick", Mode::SingleShot);
        let k = sim.slot::<u64>("tock");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sim.bind_fn(k, move |sim: &mut Simulation, n: u64| {
            sink.borrow_mut().push(sim.now().ticks());
            if n < 3 {
                // Re-arming during our own fan-out is a fresh arming.
                sim.emit(s, n + 1, 10).unwrap();
            }
        })
        .unwrap();
        sim.connect(s, k).unwrap();

        sim.emit(s, 0, 0).unwrap();
        sim.run();
        assert_eq!(*seen.borrow(), vec![0, 10, 20, 30]);
        assert!(!sim.is_armed(s).unwrap());
    }

    #[test]
    fn test_step_by_step() {
        let mut sim = Simulation::new();
        let (s, _log) = logger(&mut sim);
        sim.emit(s, "x", 5).unwrap();
        sim.emit(s, "y", 15).unwrap();

        let first = sim.step().unwrap();
        assert_eq!(first.scheduled_at, VirtualTime::new(5));
        assert_eq!(first.signal, s.key());
        assert_eq!(sim.current_time(), VirtualTime::new(5));

        let second = sim.step().unwrap();
        assert_eq!(second.scheduled_at, VirtualTime::new(15));
        assert!(sim.step().is_none());
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        let (s, _log) = logger(&mut sim);
        for i in 0..100 {
            sim.emit(s, "n", i).unwrap();
        }

        assert_eq!(sim.run_for(10), 10);
        assert_eq!(sim.events_processed(), 10);
        assert!(!sim.is_finished());
        assert_eq!(sim.pending_count(), 90);
    }

    #[test]
    fn test_run_until_stops_and_sets_clock() {
        let mut sim = Simulation::new();
        let (s, log) = logger(&mut sim);
        sim.emit(s, "early", 4).unwrap();
        sim.emit(s, "edge", 7).unwrap();
        sim.emit(s, "late", 12).unwrap();

        assert_eq!(sim.run_until(VirtualTime::new(7)), 2);
        assert_eq!(sim.now(), VirtualTime::new(7));
        assert_eq!(log.borrow().len(), 2);

        // Past target leaves the clock alone.
        assert_eq!(sim.run_until(VirtualTime::new(3)), 0);
        assert_eq!(sim.now(), VirtualTime::new(7));

        sim.run_until(VirtualTime::new(100));
        assert_eq!(sim.now(), VirtualTime::new(100));
        assert_eq!(log.borrow().last(), Some(&(12, "late")));
    }

    #[test]
    fn test_start_time_from_config() {
        let mut sim = Simulation::with_config(
            SimulationConfig::new().starting_at(VirtualTime::new(50)),
        );
        let (s, log) = logger(&mut sim);
        sim.emit(s, "z", 5).unwrap();
        sim.run();
        assert_eq!(*log.borrow(), vec![(55, "z")]);
    }

    #[test]
    fn test_verbose_config_debugs_new_signals() {
        let mut sim = Simulation::with_config(SimulationConfig::verbose());
        let (s, _log) = logger(&mut sim);
        sim.emit(s, "traced", 1).unwrap();
        sim.run();
        assert_eq!(sim.trace.len(), 1);

        let mut quiet = Simulation::with_config(SimulationConfig::verbose().with_trace(false));
        let (s, _log) = logger(&mut quiet);
        quiet.emit(s, "untraced", 1).unwrap();
        quiet.run();
        assert!(quiet.trace.is_empty());
    }

    #[test]
    fn test_deterministic_replay() {
        fn run_trace() -> Vec<(u64, &'static str)> {
            let mut sim = Simulation::new();
            let (s, log) = logger(&mut sim);
            sim.emit(s, "alpha", 5).unwrap();
            sim.emit(s, "beta", 5).unwrap();
            sim.emit(s, "gamma", 3).unwrap();
            sim.emit(s, "delta", 10).unwrap();
            sim.run();
            let out = log.borrow().clone();
            out
        }

        assert_eq!(run_trace(), run_trace());
        assert_eq!(
            run_trace(),
            vec![(3, "gamma"), (5, "alpha"), (5, "beta"), (10, "delta")]
        );
    }

    #[test]
    #[should_panic(expected = "re-entrantly")]
    fn test_reentrant_step_panics() {
        let mut sim = Simulation::new();
        let s = sim.signal::<()>("s", Mode::Continuous);
        let k = sim.slot::<()>("k");
        sim.bind_fn(k, |sim: &mut Simulation, _: ()| {
            sim.step();
        })
        .unwrap();
        sim.connect(s, k).unwrap();
        sim.emit(s, (), 1).unwrap();
        sim.run();
    }

    #[test]
    fn test_step_recovers_after_handler_panic() {
        let mut sim = Simulation::new();
        let s = sim.signal::<bool>("s", Mode::Continuous);
        let k = sim.slot::<bool>("k");
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        sim.bind_fn(k, move |_: &mut Simulation, fail: bool| {
            if fail {
                panic!("handler failed");
            }
            counter.set(counter.get() + 1);
        })
        .unwrap();
        sim.connect(s, k).unwrap();
        sim.emit(s, true, 1).unwrap();
        sim.emit(s, false, 2).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sim.step();
        }));
        assert!(outcome.is_err());

        assert!(sim.step().is_some());
        assert_eq!(hits.get(), 1);
        assert!(sim.is_finished());
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::new();
        assert_eq!(sim.run(), 0);
        assert!(sim.is_finished());
        assert!(format!("{:?}", sim).contains("pending: 0"));
    }
}
