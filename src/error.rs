//! Structured error types for synapse.
//!
//! Fallible public APIs return `Result<T, SimError>`. Benign redundancy
//! (reconnecting a connected pair, delivering through an unbound slot)
//! is never an error; it is absorbed and at most logged.

use thiserror::Error;

use crate::signal::{SignalKey, SlotKey};

/// The top-level error type for the signal/slot kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SimError {
    /// A signal handle was used after its signal was destroyed.
    #[error("signal {0} does not exist")]
    UnknownSignal(SignalKey),

    /// A slot handle was used after its slot was destroyed.
    #[error("slot {0} does not exist")]
    UnknownSlot(SlotKey),

    /// The expiration time of a timer was queried while it was idle.
    #[error("timer '{0}' is not set")]
    TimerNotPending(String),

    /// Scheduling would push virtual time past `u64::MAX`.
    #[error("cannot schedule {delay} ticks after T={now}: virtual time overflow")]
    TimeOverflow { now: u64, delay: u64 },
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
