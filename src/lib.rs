//! # Synapse — typed signals and slots on a discrete-event clock
//!
//! Simulated entities exchange values without holding references to each
//! other: each owns a [`SignalId`] it emits on and a [`SlotId`] it receives
//! on, and the wiring between them lives in the [`Simulation`]. Emitting
//! schedules a delayed, cancellable delivery; the simulation dispatches it
//! when virtual time reaches the due instant. No async, no threads, no
//! wall-clock time.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │  Timer / Alarm            │ ← single-consumer set / reset / cancel
//! │  ┌─────────────────────┐  │
//! │  │ Signal ─links─ Slot │  │ ← typed arena, bidirectional keys
//! │  └─────────────────────┘  │
//! │  ┌─────────────────────┐  │
//! │  │ Simulation          │  │ ← dispatch loop, clock, fan-out
//! │  │  ┌───────────────┐  │  │
//! │  │  │ Scheduler     │  │  │ ← cancellable min-heap
//! │  │  └───────────────┘  │  │
//! │  └─────────────────────┘  │
//! └───────────────────────────┘
//! ```

pub mod alarm;
pub mod config;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod signal;
pub mod simulation;
pub mod time;
pub mod timer;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience.
pub use alarm::Alarm;
pub use config::SimulationConfig;
pub use error::{SimError, SimResult};
pub use event::{DeliveryHandle, Event, EventId};
pub use scheduler::Scheduler;
pub use signal::{Mode, Receiver, SignalId, SignalKey, SlotId, SlotKey};
pub use simulation::Simulation;
pub use time::VirtualTime;
pub use timer::Timer;
pub use trace::DeliveryRecord;
