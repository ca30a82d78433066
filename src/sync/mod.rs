//! Exclusion primitives
//!
//! This module provides the locks the deque is built on, behind one capability trait
//! so backends can be swapped without touching the deque.
//!
//! ## Available Locks
//!
//! - [`SpinMutex`]: CAS spinlock that yields between attempts
//! - [`ParkingMutex`]: `parking_lot` raw mutex that parks waiters
//!
//! Both track the [`OwnerId`] of the holding thread and refuse to be released by
//! anyone else.

pub mod owner;
pub mod parking;
pub mod spin;

pub use self::owner::{OwnerId, UNASSIGNED_OWNER};
pub use self::parking::ParkingMutex;
pub use self::spin::SpinMutex;

use crate::Result;
use core::marker::PhantomData;

/// Capability interface of an owner-tracking lock
///
/// # Safety
///
/// Implementors must guarantee that between a successful [`lock`](RawLock::lock) or
/// [`try_lock`](RawLock::try_lock) and the matching successful
/// [`unlock`](RawLock::unlock), no other thread can acquire the lock, and that
/// acquiring synchronizes-with the previous release. [`LinkedDeque`](crate::LinkedDeque)
/// relies on this to hand out unsynchronized access to its chain.
pub unsafe trait RawLock: Send + Sync {
    /// Create the lock in its unlocked state
    fn new() -> Self
    where
        Self: Sized;

    /// Acquire the lock, blocking the calling thread until it succeeds
    fn lock(&self);

    /// Make a single non-blocking acquisition attempt
    fn try_lock(&self) -> bool;

    /// Release the lock held by the calling thread
    ///
    /// # Errors
    ///
    /// Fails without changing any state if the caller is not the owner.
    fn unlock(&self) -> Result<()>;

    /// Whether the lock is currently held
    fn is_locked(&self) -> bool;

    /// The thread currently holding the lock
    fn owner(&self) -> Option<OwnerId>;

    /// Acquisition attempts that found the lock already held, since creation
    fn failed_attempts(&self) -> u64;
}

/// Holds a [`RawLock`] for the lifetime of a critical section.
///
/// Not `Send`: the release must come from the thread that acquired.
pub(crate) struct LockGuard<'a, L: RawLock> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: RawLock> LockGuard<'a, L> {
    /// Acquire `lock`, reporting whether the fast path failed and we had to wait
    #[inline]
    pub(crate) fn acquire(lock: &'a L) -> (Self, bool) {
        let contended = !lock.try_lock();
        if contended {
            lock.lock();
        }
        let guard = Self {
            lock,
            _not_send: PhantomData,
        };
        (guard, contended)
    }
}

impl<L: RawLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        let released = self.lock.unlock();
        debug_assert!(released.is_ok(), "critical section released by a non-owner");
    }
}

#[cfg(test)]
mod tests;
