//! Parking Mutex
//!
//! The [`RawLock`] contract on top of `parking_lot`'s raw mutex. Waiters park in the
//! OS instead of spinning, which suits longer critical sections or oversubscribed
//! machines. Ownership is tracked the same way as [`SpinMutex`](super::SpinMutex).

use super::owner::{OwnerId, OwnerSlot};
use super::RawLock;
use crate::{Error, Result};
use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::lock_api::RawMutex as _;

/// A parking mutual-exclusion lock with owner tracking
pub struct ParkingMutex {
    raw: parking_lot::RawMutex,
    owner: OwnerSlot,
    failed_attempts: AtomicU64,
}

impl ParkingMutex {
    /// Create an unlocked mutex with no owner
    #[inline]
    pub const fn new() -> Self {
        Self {
            raw: parking_lot::RawMutex::INIT,
            owner: OwnerSlot::new(),
            failed_attempts: AtomicU64::new(0),
        }
    }

    /// Acquire the lock, parking the thread while it is held elsewhere
    pub fn lock(&self) {
        if !self.raw.try_lock() {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
            self.raw.lock();
        }
        self.owner.claim(OwnerId::current());
    }

    /// Make a single attempt to acquire the lock
    pub fn try_lock(&self) -> bool {
        let acquired = self.raw.try_lock();
        if acquired {
            self.owner.claim(OwnerId::current());
        } else {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        }
        acquired
    }

    /// Release the lock
    ///
    /// # Errors
    ///
    /// * `Error::NotOwner` if the calling thread is not the recorded owner; nothing changes
    pub fn unlock(&self) -> Result<()> {
        let caller = OwnerId::current();
        if !self.owner.is_held_by(caller) {
            tracing::warn!(
                caller = %caller,
                owner = ?self.owner.get(),
                "rejected unlock from a thread that does not own the parking mutex"
            );
            return Err(Error::NotOwner);
        }

        self.owner.clear();
        // SAFETY: the owner check above proves the calling thread acquired `raw`
        unsafe { self.raw.unlock() };
        Ok(())
    }

    /// Whether some thread currently holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// The current holder, if any
    #[inline]
    pub fn owner(&self) -> Option<OwnerId> {
        self.owner.get()
    }

    /// Number of acquisition attempts that found the lock held and had to park or give up
    #[inline]
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }
}

impl Default for ParkingMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParkingMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParkingMutex")
            .field("locked", &self.is_locked())
            .field("owner", &self.owner())
            .finish()
    }
}

// SAFETY: `parking_lot::RawMutex` provides the exclusion; unlock is only forwarded
// for the thread that acquired it.
unsafe impl RawLock for ParkingMutex {
    #[inline]
    fn new() -> Self {
        ParkingMutex::new()
    }

    #[inline]
    fn lock(&self) {
        ParkingMutex::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> bool {
        ParkingMutex::try_lock(self)
    }

    #[inline]
    fn unlock(&self) -> Result<()> {
        ParkingMutex::unlock(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        ParkingMutex::is_locked(self)
    }

    #[inline]
    fn owner(&self) -> Option<OwnerId> {
        ParkingMutex::owner(self)
    }

    #[inline]
    fn failed_attempts(&self) -> u64 {
        ParkingMutex::failed_attempts(self)
    }
}
