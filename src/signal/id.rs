//! Arena keys, typed handles, and the signal arming mode.

use std::marker::PhantomData;

/// Arena key of a signal. Minted once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalKey(u64);

impl SignalKey {
    #[inline]
    pub fn new(raw: u64) -> Self {
        SignalKey(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Arena key of a slot. Minted once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotKey(u64);

impl SlotKey {
    #[inline]
    pub fn new(raw: u64) -> Self {
        SlotKey(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "K{}", self.0)
    }
}

// ── Typed handles ─────────────────────────────────────────────────────

/// Handle to a signal emitting values of type `T`.
///
/// The handle is a plain `Copy` key: it owns nothing. Using it after
/// `Simulation::destroy_signal` yields `SimError::UnknownSignal`.
pub struct SignalId<T> {
    key: SignalKey,
    _payload: PhantomData<fn(T)>,
}

impl<T> SignalId<T> {
    pub(crate) fn from_key(key: SignalKey) -> Self {
        SignalId {
            key,
            _payload: PhantomData,
        }
    }

    /// The untyped arena key.
    #[inline]
    pub fn key(self) -> SignalKey {
        self.key
    }
}

impl<T> Clone for SignalId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SignalId<T> {}

impl<T> PartialEq for SignalId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for SignalId<T> {}

impl<T> std::fmt::Debug for SignalId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignalId({})", self.key)
    }
}

/// Handle to a slot receiving values of type `T`.
pub struct SlotId<T> {
    key: SlotKey,
    _payload: PhantomData<fn(T)>,
}

impl<T> SlotId<T> {
    pub(crate) fn from_key(key: SlotKey) -> Self {
        SlotId {
            key,
            _payload: PhantomData,
        }
    }

    /// The untyped arena key.
    #[inline]
    pub fn key(self) -> SlotKey {
        self.key
    }
}

impl<T> Clone for SlotId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotId<T> {}

impl<T> PartialEq for SlotId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for SlotId<T> {}

impl<T> std::fmt::Debug for SlotId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SlotId({})", self.key)
    }
}

// ── Mode ──────────────────────────────────────────────────────────────

/// How a signal treats a new `emit` while a delivery is outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Every emit schedules an independent delivery; `cancel` is a no-op.
    #[default]
    Continuous,
    /// At most one outstanding delivery; emitting again replaces it.
    SingleShot,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Continuous => write!(f, "continuous"),
            Mode::SingleShot => write!(f, "single-shot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(SignalKey::new(4).to_string(), "S4");
        assert_eq!(SlotKey::new(9).to_string(), "K9");
    }

    #[test]
    fn test_typed_handle_is_copy_without_clone_payload() {
        // `T` is not Clone, the handle still is.
        struct Opaque;
        let a: SignalId<Opaque> = SignalId::from_key(SignalKey::new(1));
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.key().raw(), 1);
        assert_eq!(format!("{:?}", a), "SignalId(S1)");
    }

    #[test]
    fn test_mode_default() {
        assert_eq!(Mode::default(), Mode::Continuous);
        assert_eq!(Mode::SingleShot.to_string(), "single-shot");
    }
}
