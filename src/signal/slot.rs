//! Slot binding and delivery.
//!
//! A slot is the receiving end of a connection. Until it is bound, a
//! delivery into it is silently dropped. Owner bindings hold only a weak
//! reference, so a slot never keeps its owner alive and never reaches into
//! a dropped one.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::error::{SimError, SimResult};
use crate::simulation::{ScopeMark, Simulation};

use super::id::{SlotId, SlotKey};

/// Type-erased delivery target stored in a bound slot.
pub(crate) type Handler<T> = Rc<dyn Fn(&mut Simulation, T)>;

/// Wrap `handler` on a weakly held `owner` as a slot handler.
///
/// A delivery that reaches an owner already inside one of its own
/// handlers (a synchronous `trigger` or `deliver` chain looping back)
/// cannot borrow it a second time. It is queued instead and runs as soon
/// as the outermost handler returns, in arrival order.
pub(crate) fn owner_handler<O: 'static, T: 'static>(
    owner: &Rc<RefCell<O>>,
    handler: fn(&mut O, &mut Simulation, T),
) -> Handler<T> {
    let owner = Rc::downgrade(owner);
    Rc::new(move |sim: &mut Simulation, value: T| {
        if let Err(value) = call_owner(&owner, handler, sim, value) {
            trace!("owner busy; delivery deferred");
            let owner = Weak::clone(&owner);
            sim.deferred.push_back(Box::new(move |sim: &mut Simulation| {
                if call_owner(&owner, handler, sim, value).is_err() {
                    warn!("owner still borrowed outside the simulation; delivery dropped");
                }
            }));
        }
    })
}

/// Run `handler` on `owner`, handing `value` back if the owner is borrowed.
fn call_owner<O, T>(
    owner: &Weak<RefCell<O>>,
    handler: fn(&mut O, &mut Simulation, T),
    sim: &mut Simulation,
    value: T,
) -> Result<(), T> {
    let Some(owner) = owner.upgrade() else {
        return Ok(());
    };
    let Ok(mut this) = owner.try_borrow_mut() else {
        return Err(value);
    };
    handler(&mut this, sim, value);
    Ok(())
}

/// Capability "accept a delivered value of type `T`".
///
/// Implement this on an entity that has a single obvious entry point for
/// a payload type, then bind it with [`Simulation::bind_receiver`].
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use synapse::{Mode, Receiver, Simulation};
///
/// struct Counter { total: u32 }
///
/// impl Receiver<u32> for Counter {
///     fn receive(&mut self, _sim: &mut Simulation, value: u32) {
///         self.total += value;
///     }
/// }
///
/// let mut sim = Simulation::new();
/// let counter = Rc::new(RefCell::new(Counter { total: 0 }));
/// let sig = sim.signal::<u32>("ticks", Mode::Continuous);
/// let slot = sim.slot::<u32>("counter");
/// sim.bind_receiver(slot, &counter).unwrap();
/// sim.connect(sig, slot).unwrap();
///
/// sim.emit(sig, 2, 1).unwrap();
/// sim.emit(sig, 3, 2).unwrap();
/// sim.run();
/// assert_eq!(counter.borrow().total, 5);
/// ```
pub trait Receiver<T> {
    fn receive(&mut self, sim: &mut Simulation, value: T);
}

impl Simulation {
    /// Bind `slot` to `handler` invoked on `owner`.
    ///
    /// The slot keeps a weak reference: once every strong `Rc` to the owner
    /// is gone, deliveries become no-ops. Rebinding replaces the previous
    /// target.
    ///
    /// A delivery into an owner that is still running one of its handlers
    /// is deferred until that handler returns. One that finds the owner
    /// borrowed by code outside the simulation is dropped with a warning.
    pub fn bind<O: 'static, T: 'static>(
        &mut self,
        slot: SlotId<T>,
        owner: &Rc<RefCell<O>>,
        handler: fn(&mut O, &mut Simulation, T),
    ) -> SimResult<()> {
        self.install(slot, owner_handler(owner, handler))
    }

    /// Bind `slot` to the owner's [`Receiver`] implementation.
    pub fn bind_receiver<R, T>(&mut self, slot: SlotId<T>, owner: &Rc<RefCell<R>>) -> SimResult<()>
    where
        R: Receiver<T> + 'static,
        T: 'static,
    {
        self.bind(slot, owner, <R as Receiver<T>>::receive)
    }

    /// Bind `slot` to a free-standing closure.
    pub fn bind_fn<T: 'static>(
        &mut self,
        slot: SlotId<T>,
        f: impl Fn(&mut Simulation, T) + 'static,
    ) -> SimResult<()> {
        self.install(slot, Rc::new(f))
    }

    pub fn is_bound<T>(&self, slot: SlotId<T>) -> SimResult<bool> {
        let key = slot.key();
        self.slots
            .get(&key)
            .map(|e| e.receiver.is_some())
            .ok_or(SimError::UnknownSlot(key))
    }

    /// Run the slot's handler with `value` right now, as a connected signal
    /// would. Returns `Ok(false)` when the slot is unbound.
    ///
    /// See [`bind`](Self::bind) for deliveries into a busy owner.
    pub fn deliver<T: 'static>(&mut self, slot: SlotId<T>, value: T) -> SimResult<bool> {
        let key = slot.key();
        if !self.slots.contains_key(&key) {
            return Err(SimError::UnknownSlot(key));
        }
        Ok(self.invoke(key, value))
    }

    fn install<T: 'static>(&mut self, slot: SlotId<T>, handler: Handler<T>) -> SimResult<()> {
        let key = slot.key();
        let entry = self.slots.get_mut(&key).ok_or(SimError::UnknownSlot(key))?;
        let receiver: Box<dyn Any> = Box::new(handler);
        entry.receiver = Some(receiver);
        trace!(slot = %key, "slot bound");
        Ok(())
    }

    /// Call the handler bound to `key`, if any.
    ///
    /// The handler is cloned out of the arena before the call so it can
    /// freely connect, disconnect, emit or destroy while it runs.
    pub(crate) fn invoke<T: 'static>(&mut self, key: SlotKey, value: T) -> bool {
        let handler = self
            .slots
            .get(&key)
            .and_then(|e| e.receiver.as_ref())
            .and_then(|r| r.downcast_ref::<Handler<T>>())
            .cloned();
        match handler {
            Some(handler) => {
                {
                    let _mark = ScopeMark::enter(&self.handler_depth);
                    handler(self, value);
                }
                if self.handler_depth.get() == 0 {
                    self.run_deferred();
                }
                true
            }
            None => false,
        }
    }

    /// Run deliveries deferred on busy owners. Called once the outermost
    /// handler has returned.
    fn run_deferred(&mut self) {
        while let Some(call) = self.deferred.pop_front() {
            let _mark = ScopeMark::enter(&self.handler_depth);
            call(self);
        }
    }
}
