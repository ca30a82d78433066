//! Thread identity tokens for lock ownership.

use core::fmt;
use core::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Raw owner value stored while a lock is free.
pub const UNASSIGNED_OWNER: usize = 0;

static NEXT_OWNER: AtomicUsize = AtomicUsize::new(UNASSIGNED_OWNER + 1);

thread_local! {
    static CURRENT: OwnerId = OwnerId::allocate();
}

/// Identity of a thread that can hold a lock.
///
/// Each thread receives a distinct non-zero token the first time it asks for one.
/// Tokens are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(NonZeroUsize);

impl OwnerId {
    /// Token of the calling thread
    #[inline]
    pub fn current() -> Self {
        CURRENT.with(|id| *id)
    }

    /// Raw value of the token, never [`UNASSIGNED_OWNER`]
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0.get()
    }

    #[inline]
    pub(crate) fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(OwnerId)
    }

    fn allocate() -> Self {
        let raw = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        Self::from_raw(raw).expect("owner id space exhausted")
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Owner field shared by the lock backends.
///
/// Written only by the thread holding the lock. Other threads read it solely to
/// compare against their own token, so relaxed ordering suffices.
#[derive(Debug)]
pub(crate) struct OwnerSlot(AtomicUsize);

impl OwnerSlot {
    pub(crate) const fn new() -> Self {
        Self(AtomicUsize::new(UNASSIGNED_OWNER))
    }

    #[inline]
    pub(crate) fn claim(&self, id: OwnerId) {
        self.0.store(id.as_usize(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.0.store(UNASSIGNED_OWNER, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn is_held_by(&self, id: OwnerId) -> bool {
        self.0.load(Ordering::Relaxed) == id.as_usize()
    }

    #[inline]
    pub(crate) fn get(&self) -> Option<OwnerId> {
        OwnerId::from_raw(self.0.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_current_is_stable_per_thread() {
        assert_eq!(OwnerId::current(), OwnerId::current());
        assert_ne!(OwnerId::current().as_usize(), UNASSIGNED_OWNER);
    }

    #[test]
    fn test_threads_get_distinct_ids() {
        let here = OwnerId::current();
        let there = thread::spawn(OwnerId::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_slot_lifecycle() {
        let slot = OwnerSlot::new();
        let me = OwnerId::current();
        assert_eq!(slot.get(), None);
        assert!(!slot.is_held_by(me));

        slot.claim(me);
        assert!(slot.is_held_by(me));
        assert_eq!(slot.get(), Some(me));

        slot.clear();
        assert_eq!(slot.get(), None);
    }
}
