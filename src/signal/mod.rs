//! Typed signals and slots.
//!
//! A signal schedules delayed, cancellable delivery of a value; every slot
//! connected to it receives the value when the delivery becomes due.
//! Neither side owns the other: both live in the [`Simulation`] arena and
//! refer to each other by key, so destroying either end simply removes its
//! key from the other end's link set.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`SignalKey`], [`SlotKey`], typed [`SignalId`] / [`SlotId`], [`Mode`] |
//! | [`links`] | [`Links`] insertion-ordered connection set |
//! | `registry` | create / connect / disconnect / destroy |
//! | `emit` | emit / cancel / trigger and fan-out |
//! | `slot` | [`Receiver`] trait, slot binding, direct delivery |
//!
//! [`Simulation`]: crate::Simulation

pub mod id;
pub mod links;

mod emit;
pub(crate) mod registry;
mod slot;

pub use id::{Mode, SignalId, SignalKey, SlotId, SlotKey};
pub use links::Links;
pub use slot::Receiver;
pub(crate) use slot::owner_handler;
