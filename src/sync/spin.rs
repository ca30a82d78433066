//! Compare-and-swap Spin Mutex
//!
//! A mutual-exclusion lock made of one atomic state word plus an owner field.
//!
//! ## Design
//!
//! - `state` holds `UNLOCKED` or `LOCKED`; each transition is exactly one CAS
//! - `owner` records the holder's [`OwnerId`] and is meaningful only while `LOCKED`
//! - A failed acquire attempt yields the thread's time slice before retrying
//! - `failed_attempts` counts every CAS that found the lock held
//!
//! ## Memory Ordering
//!
//! - `lock`: `AcqRel` on the successful CAS, `Relaxed` on failure
//! - `failed_attempts`: `Relaxed`; a statistic, it orders nothing
//! - `unlock`: owner cleared first, then `AcqRel` CAS back to `UNLOCKED`
//!
//! ## Limitations
//!
//! - No fairness: whichever waiter wins the next CAS gets the lock
//! - Not re-entrant: locking twice from the same thread spins forever
//! - No timeout and no cancellation
//!
//! ## Example
//!
//! ```rust
//! use spindeque::{Error, SpinMutex};
//!
//! let mutex = SpinMutex::new();
//! mutex.lock();
//! assert!(mutex.is_locked());
//! assert_eq!(mutex.unlock(), Ok(()));
//! assert_eq!(mutex.unlock(), Err(Error::NotOwner));
//! ```

use super::owner::{OwnerId, OwnerSlot};
use super::RawLock;
use crate::util::CachePadded;
use crate::{Error, Result};
use core::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// A spinning mutual-exclusion lock with owner tracking
///
/// The mutex guards no data of its own; callers pair it with the state it protects.
/// It holds no OS resources.
pub struct SpinMutex {
    state: CachePadded<AtomicU32>,
    owner: OwnerSlot,
    failed_attempts: AtomicU64,
}

impl SpinMutex {
    /// Create an unlocked mutex with no owner
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: CachePadded::new(AtomicU32::new(UNLOCKED)),
            owner: OwnerSlot::new(),
            failed_attempts: AtomicU64::new(0),
        }
    }

    /// Acquire the lock, spinning until it becomes available
    ///
    /// Each failed attempt yields the current thread. Calling this while already
    /// holding the lock never returns.
    pub fn lock(&self) {
        while self
            .state
            .get()
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
            std::thread::yield_now();
        }
        self.owner.claim(OwnerId::current());
    }

    /// Make a single attempt to acquire the lock
    ///
    /// Returns `true` if the calling thread now holds the lock.
    pub fn try_lock(&self) -> bool {
        let acquired = self
            .state
            .get()
            .compare_exchange(UNLOCKED, LOCKED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();
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
    /// * `Error::NotLocked` if the state word was not `LOCKED`
    pub fn unlock(&self) -> Result<()> {
        let caller = OwnerId::current();
        if !self.owner.is_held_by(caller) {
            tracing::warn!(
                caller = %caller,
                owner = ?self.owner.get(),
                "rejected unlock from a thread that does not own the spin mutex"
            );
            return Err(Error::NotOwner);
        }

        self.owner.clear();
        // Critical section ends here
        if self
            .state
            .get()
            .compare_exchange(LOCKED, UNLOCKED, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            tracing::warn!(caller = %caller, "unlock of a spin mutex that was not locked");
            return Err(Error::NotLocked);
        }
        Ok(())
    }

    /// Whether some thread currently holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.get().load(Ordering::Relaxed) == LOCKED
    }

    /// The current holder, if any
    #[inline]
    pub fn owner(&self) -> Option<OwnerId> {
        self.owner.get()
    }

    /// Number of acquisition CAS attempts that found the lock held, since creation
    ///
    /// `compare_exchange_weak` may also fail spuriously; those failures are counted too.
    #[inline]
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// Tear the mutex down
    ///
    /// There is nothing to release; this exists so call sites can mark the end of
    /// the mutex's life explicitly.
    #[inline]
    pub fn destroy(self) {
        debug_assert!(!self.is_locked(), "destroying a locked spin mutex");
    }
}

impl Default for SpinMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpinMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinMutex")
            .field("locked", &self.is_locked())
            .field("owner", &self.owner())
            .field("failed_attempts", &self.failed_attempts())
            .finish()
    }
}

// SAFETY: the CAS on `state` admits exactly one holder between a successful
// `lock`/`try_lock` and the matching `unlock`, with acquire/release edges on both.
unsafe impl RawLock for SpinMutex {
    #[inline]
    fn new() -> Self {
        SpinMutex::new()
    }

    #[inline]
    fn lock(&self) {
        SpinMutex::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> bool {
        SpinMutex::try_lock(self)
    }

    #[inline]
    fn unlock(&self) -> Result<()> {
        SpinMutex::unlock(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        SpinMutex::is_locked(self)
    }

    #[inline]
    fn owner(&self) -> Option<OwnerId> {
        SpinMutex::owner(self)
    }

    #[inline]
    fn failed_attempts(&self) -> u64 {
        SpinMutex::failed_attempts(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unlocked() {
        let mutex = SpinMutex::new();
        assert!(!mutex.is_locked());
        assert_eq!(mutex.owner(), None);
        mutex.destroy();
    }

    #[test]
    fn test_lock_records_owner() {
        let mutex = SpinMutex::new();
        mutex.lock();
        assert!(mutex.is_locked());
        assert_eq!(mutex.owner(), Some(OwnerId::current()));

        assert_eq!(mutex.unlock(), Ok(()));
        assert!(!mutex.is_locked());
        assert_eq!(mutex.owner(), None);
    }

    #[test]
    fn test_try_lock() {
        let mutex = SpinMutex::new();
        assert!(mutex.try_lock());
        assert!(!mutex.try_lock());
        assert_eq!(mutex.unlock(), Ok(()));
        assert!(mutex.try_lock());
        assert_eq!(mutex.unlock(), Ok(()));
    }

    #[test]
    fn test_failed_attempts_count_while_held() {
        use std::sync::{mpsc, Arc};
        use std::thread;
        use std::time::Duration;

        let mutex = Arc::new(SpinMutex::new());
        assert!(mutex.try_lock());
        assert!(!mutex.try_lock());
        assert_eq!(mutex.failed_attempts(), 1);

        let (started_tx, started_rx) = mpsc::channel();
        let waiter = {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                started_tx.send(()).unwrap();
                mutex.lock();
                mutex.unlock()
            })
        };

        started_rx.recv().unwrap();
        while mutex.failed_attempts() < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(mutex.unlock(), Ok(()));
        assert_eq!(waiter.join().unwrap(), Ok(()));

        assert!(mutex.failed_attempts() >= 3);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_double_unlock_fails() {
        let mutex = SpinMutex::new();
        mutex.lock();
        assert_eq!(mutex.unlock(), Ok(()));
        assert_eq!(mutex.unlock(), Err(Error::NotOwner));
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_debug_format() {
        let mutex = SpinMutex::new();
        let debug_str = format!("{:?}", mutex);
        assert!(debug_str.contains("SpinMutex"));
        assert!(debug_str.contains("locked: false"));
    }
}
