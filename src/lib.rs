//! # spindeque
//!
//! A thread-safe double-ended queue backed by a doubly linked list and guarded by a
//! small mutual-exclusion primitive built directly on atomic compare-and-swap.
//!
//! ## Features
//!
//! - **SpinMutex**: CAS spinlock with explicit owner tracking and owner-checked unlock
//! - **ParkingMutex**: the same contract on top of `parking_lot`, for swapping backends
//! - **LinkedDeque**: insert at the head, remove or peek at either end, with an optional
//!   disposer for values the queue discards on the caller's behalf
//!
//! ## Quick Start
//!
//! ```rust
//! use spindeque::LinkedDeque;
//!
//! let deque = LinkedDeque::new();
//! deque.push_head(1);
//! deque.push_head(2);
//! assert_eq!(deque.peek_head(), Some(2));
//! assert_eq!(deque.pop_tail(), Some(1));
//! assert_eq!(deque.len(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! Every deque operation takes the embedded lock for its whole critical section, so
//! operations on one deque are linearizable. Waiters are not served in FIFO order.
//!
//! ## Swapping the lock
//!
//! ```rust
//! use spindeque::{LinkedDeque, ParkingMutex};
//!
//! let deque = LinkedDeque::with_lock(ParkingMutex::new());
//! deque.push_head("hello");
//! assert_eq!(deque.pop_tail(), Some("hello"));
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod deque;
pub mod metrics;
pub mod sync;

pub use crate::deque::LinkedDeque;
pub use crate::metrics::{MetricsCollector, PerformanceMetrics};
pub use crate::sync::{OwnerId, ParkingMutex, RawLock, SpinMutex};

/// Common utilities and helper types
pub mod util {
    /// Cache line size for alignment purposes
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Pad a value out to its own cache line
    #[repr(align(64))]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }

        /// Get a reference to the inner value
        #[inline]
        pub const fn get(&self) -> &T {
            &self.value
        }

        /// Get a mutable reference to the inner value
        #[inline]
        pub fn get_mut(&mut self) -> &mut T {
            &mut self.value
        }

        /// Get the inner value
        #[inline]
        pub fn into_inner(self) -> T {
            self.value
        }
    }

    impl<T: Default> Default for CachePadded<T> {
        fn default() -> Self {
            Self::new(T::default())
        }
    }

    impl<T: core::fmt::Debug> core::fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(&self.value, f)
        }
    }
}

/// Error types for spindeque operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The calling thread does not hold the lock it tried to release
    NotOwner,
    /// The lock was released while it was not held
    NotLocked,
    /// The deque has no element to remove
    Empty,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotOwner => write!(f, "Lock is not held by the calling thread"),
            Error::NotLocked => write!(f, "Lock was not locked"),
            Error::Empty => write!(f, "Deque is empty"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for spindeque operations
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_padded() {
        let padded = util::CachePadded::new(42);
        assert_eq!(*padded.get(), 42);
        assert_eq!(core::mem::align_of::<util::CachePadded<u8>>(), util::CACHE_LINE_SIZE);

        let mut padded = padded;
        *padded.get_mut() = 100;
        assert_eq!(padded.into_inner(), 100);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::NotOwner.to_string(),
            "Lock is not held by the calling thread"
        );
        assert_eq!(Error::NotLocked.to_string(), "Lock was not locked");
        assert_eq!(Error::Empty.to_string(), "Deque is empty");
    }
}
