// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Opaque handle to the live native engine instance.
//
// The engine hands the host a pointer-sized id when its instance comes up and
// zero when it goes away. The owning activity keeps it in a `BridgeSlot`;
// collaborators never store it, they receive a copy per call after the slot
// has been checked.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Non-null engine instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeHandle(NonZeroU64);

impl BridgeHandle {
    /// Wrap a raw id received from the engine. Zero means "no instance".
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn as_raw(&self) -> u64 {
        self.0.get()
    }
}

/// Lock-free holder of the optional handle.
///
/// Every read is a single atomic load, so the UI, sensor and service threads
/// can all check it without contention. A read that races with teardown sees
/// either the old handle or none; the engine tolerates a call that lands just
/// before invalidation.
#[derive(Debug, Default)]
pub struct BridgeSlot(AtomicU64);

impl BridgeSlot {
    pub const fn empty() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Install or clear the handle. Returns the previous one.
    pub fn set(&self, handle: Option<BridgeHandle>) -> Option<BridgeHandle> {
        let raw = handle.map_or(0, |h| h.as_raw());
        BridgeHandle::from_raw(self.0.swap(raw, Ordering::AcqRel))
    }

    pub fn get(&self) -> Option<BridgeHandle> {
        BridgeHandle::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn is_live(&self) -> bool {
        self.get().is_some()
    }

    /// Run `f` with the handle if one is installed; a no-op otherwise.
    pub fn with<R>(&self, f: impl FnOnce(BridgeHandle) -> R) -> Option<R> {
        self.get().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_no_handle() {
        assert!(BridgeHandle::from_raw(0).is_none());
        assert_eq!(BridgeHandle::from_raw(0xdead).map(|h| h.as_raw()), Some(0xdead));
    }

    #[test]
    fn slot_lifecycle() {
        let slot = BridgeSlot::empty();
        assert!(!slot.is_live());
        assert_eq!(slot.with(|h| h.as_raw()), None);

        let h = BridgeHandle::from_raw(42);
        assert_eq!(slot.set(h), None);
        assert_eq!(slot.with(|h| h.as_raw()), Some(42));

        assert_eq!(slot.set(None), h);
        assert!(!slot.is_live());
    }
}
