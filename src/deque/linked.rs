//! Locked Linked-List Deque
//!
//! A doubly linked list with head/tail links and a length counter, guarded by one
//! [`RawLock`]. Values enter at the head and leave from the tail, so the deque behaves
//! as a FIFO queue whose newest element is visible at the head.
//!
//! ## Design
//!
//! - Nodes are boxed individually and owned by the chain through the `next` links
//! - `prev` and `tail` are non-owning back-references used for O(1) removal
//! - Node allocation and deallocation happen outside the critical section
//! - The disposer runs after the lock is released, so it may touch the deque
//!
//! ## Invariants
//!
//! Whenever the lock is free:
//! - `len == 0` iff `head` is `None` iff `tail` is `None`
//! - following `next` from `head` reaches `tail` in `len - 1` steps, and `prev`
//!   from `tail` reaches `head` in the same number
//!
//! ## Example
//!
//! ```rust
//! use spindeque::LinkedDeque;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let deque = Arc::new(LinkedDeque::new());
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|id| {
//!         let deque = Arc::clone(&deque);
//!         thread::spawn(move || {
//!             for i in 0..25 {
//!                 deque.push_head(id * 25 + i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for producer in producers {
//!     producer.join().unwrap();
//! }
//! assert_eq!(deque.len(), 100);
//! ```

use crate::metrics::{AtomicMetrics, MetricsCollector, PerformanceMetrics};
use crate::sync::{LockGuard, RawLock, SpinMutex};
use crate::{Error, Result};
use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Callback that takes ownership of values the deque discards
pub type Disposer<T> = Box<dyn Fn(T) + Send + Sync>;

struct Node<T> {
    value: T,
    next: Option<NonNull<Node<T>>>,
    prev: Option<NonNull<Node<T>>>,
}

impl<T> Node<T> {
    const SIZE: usize = core::mem::size_of::<Node<T>>();

    fn boxed(value: T) -> Box<Self> {
        Box::new(Self {
            value,
            next: None,
            prev: None,
        })
    }
}

/// The list itself. Only touched while the deque's lock is held or through `&mut`.
struct Chain<T> {
    head: Option<NonNull<Node<T>>>,
    tail: Option<NonNull<Node<T>>>,
    len: usize,
    _owns: PhantomData<Box<Node<T>>>,
}

impl<T> Chain<T> {
    const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _owns: PhantomData,
        }
    }

    fn link_head(&mut self, node: Box<Node<T>>) {
        let node = NonNull::from(Box::leak(node));
        // SAFETY: `node` was just leaked and every linked node is owned by this chain
        unsafe {
            (*node.as_ptr()).next = self.head;
            match self.head {
                Some(old) => (*old.as_ptr()).prev = Some(node),
                None => self.tail = Some(node),
            }
        }
        self.head = Some(node);
        self.len += 1;
    }

    fn unlink_tail(&mut self) -> Option<Box<Node<T>>> {
        let tail = self.tail?;
        // SAFETY: `tail` came from `Box::leak` in `link_head` and is unlinked here
        // exactly once
        let node = unsafe { Box::from_raw(tail.as_ptr()) };
        self.tail = node.prev;
        match node.prev {
            Some(prev) => unsafe { (*prev.as_ptr()).next = None },
            None => self.head = None,
        }
        self.len -= 1;
        Some(node)
    }

    fn unlink_head(&mut self) -> Option<Box<Node<T>>> {
        let head = self.head?;
        // SAFETY: as in `unlink_tail`
        let node = unsafe { Box::from_raw(head.as_ptr()) };
        self.head = node.next;
        match node.next {
            Some(next) => unsafe { (*next.as_ptr()).prev = None },
            None => self.tail = None,
        }
        self.len -= 1;
        Some(node)
    }

    fn head(&self) -> Option<&T> {
        // SAFETY: linked nodes stay alive for as long as `self` is borrowed
        self.head.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    fn tail(&self) -> Option<&T> {
        // SAFETY: as in `head`
        self.tail.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    /// Walks the list both ways and checks it against `len`.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        if (self.len == 0) != self.head.is_none() || self.head.is_none() != self.tail.is_none() {
            return false;
        }

        let mut forward = 0;
        let mut last = None;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            forward += 1;
            if forward > self.len {
                return false;
            }
            last = Some(node);
            cursor = unsafe { (*node.as_ptr()).next };
        }

        let mut backward = 0;
        let mut first = None;
        let mut cursor = self.tail;
        while let Some(node) = cursor {
            backward += 1;
            if backward > self.len {
                return false;
            }
            first = Some(node);
            cursor = unsafe { (*node.as_ptr()).prev };
        }

        forward == self.len && backward == self.len && last == self.tail && first == self.head
    }
}

/// A thread-safe deque over a locked doubly linked list
///
/// Values are pushed at the head and removed or dropped at the tail; both ends can
/// be peeked. Every operation holds the lock `L` for its whole critical section.
///
/// # Type Parameters
///
/// * `T` - The type of elements stored in the deque
/// * `L` - The lock backend, [`SpinMutex`] unless chosen otherwise
///
/// # Examples
///
/// ```rust
/// use spindeque::LinkedDeque;
///
/// let deque = LinkedDeque::new();
/// for i in 0..3 {
///     deque.push_head(i);
/// }
/// assert_eq!(deque.peek_head(), Some(2));
/// assert_eq!(deque.peek_tail(), Some(0));
/// assert_eq!(deque.pop_tail(), Some(0));
/// assert_eq!(deque.pop_tail(), Some(1));
/// assert_eq!(deque.pop_tail(), Some(2));
/// assert!(deque.is_empty());
/// ```
pub struct LinkedDeque<T, L: RawLock = SpinMutex> {
    lock: L,
    chain: UnsafeCell<Chain<T>>,
    disposer: Option<Disposer<T>>,
    metrics: AtomicMetrics,
    metrics_enabled: AtomicBool,
}

// SAFETY: the chain is only reachable through the lock or through `&mut self`, so
// values move between threads but are never shared unsynchronized.
unsafe impl<T: Send, L: RawLock> Send for LinkedDeque<T, L> {}
unsafe impl<T: Send, L: RawLock> Sync for LinkedDeque<T, L> {}

impl<T> LinkedDeque<T> {
    /// Create an empty deque guarded by a [`SpinMutex`]
    ///
    /// Discarded values are dropped normally.
    pub fn new() -> Self {
        Self::with_lock(SpinMutex::new())
    }

    /// Create an empty deque that hands discarded values to `disposer`
    ///
    /// The disposer receives every value removed by [`drop_tail`](Self::drop_tail)
    /// and every value still present at [`free`](Self::free) or drop time.
    ///
    /// # Panics
    ///
    /// A panic in the disposer propagates to the caller. If the deque is dropped
    /// while that panic unwinds, the values left in it are dropped without being
    /// handed to the disposer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use spindeque::LinkedDeque;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let disposed = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&disposed);
    /// let deque = LinkedDeque::with_disposer(move |_: String| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    /// });
    ///
    /// deque.push_head("a".to_string());
    /// deque.push_head("b".to_string());
    /// deque.drop_tail().unwrap();
    /// assert_eq!(deque.free(), 1);
    /// assert_eq!(disposed.load(Ordering::Relaxed), 2);
    /// ```
    pub fn with_disposer<F>(disposer: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::with_lock_and_disposer(SpinMutex::new(), disposer)
    }
}

impl<T, L: RawLock> LinkedDeque<T, L> {
    /// Create an empty deque guarded by `lock`
    pub fn with_lock(lock: L) -> Self {
        Self::build(lock, None)
    }

    /// Create an empty deque guarded by `lock` that hands discarded values to `disposer`
    pub fn with_lock_and_disposer<F>(lock: L, disposer: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(lock, Some(Box::new(disposer)))
    }

    fn build(lock: L, disposer: Option<Disposer<T>>) -> Self {
        debug_assert!(!lock.is_locked(), "deque built around a held lock");
        Self {
            lock,
            chain: UnsafeCell::new(Chain::new()),
            disposer,
            metrics: AtomicMetrics::default(),
            metrics_enabled: AtomicBool::new(true),
        }
    }

    /// Insert `value` before the current head
    ///
    /// The node is allocated before the lock is taken.
    pub fn push_head(&self, value: T) {
        let started = self.start_timer();
        let node = Node::boxed(value);
        let ((), contended) = self.with_chain(|chain| chain.link_head(node));
        self.record(started, true, contended);
    }

    /// Remove the tail element and return it
    ///
    /// Returns `None` if the deque is empty.
    pub fn pop_tail(&self) -> Option<T> {
        let started = self.start_timer();
        let (node, contended) = self.with_chain(Chain::unlink_tail);
        self.record(started, node.is_some(), contended);
        node.map(|node| node.value)
    }

    /// Remove the tail element and hand it to the disposer
    ///
    /// Without a disposer the value is dropped.
    ///
    /// # Errors
    ///
    /// * `Error::Empty` if there is no element to remove
    pub fn drop_tail(&self) -> Result<()> {
        let started = self.start_timer();
        let (node, contended) = self.with_chain(Chain::unlink_tail);
        self.record(started, node.is_some(), contended);
        let node = node.ok_or(Error::Empty)?;
        self.dispose(node.value);
        Ok(())
    }

    /// Number of elements at the instant of the call
    pub fn len(&self) -> usize {
        self.with_chain(|chain| chain.len).0
    }

    /// Whether the deque held no elements at the instant of the call
    pub fn is_empty(&self) -> bool {
        self.with_chain(|chain| chain.head.is_none()).0
    }

    /// Clone of the head element, the most recently pushed one
    pub fn peek_head(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_head_with(T::clone)
    }

    /// Clone of the tail element, the next one [`pop_tail`](Self::pop_tail) returns
    pub fn peek_tail(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_tail_with(T::clone)
    }

    /// Run `f` on the head element while the lock is held
    ///
    /// `f` must not call back into this deque; the lock is not re-entrant.
    pub fn peek_head_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let started = self.start_timer();
        let (out, contended) = self.with_chain(|chain| chain.head().map(f));
        self.record(started, out.is_some(), contended);
        out
    }

    /// Run `f` on the tail element while the lock is held
    ///
    /// `f` must not call back into this deque; the lock is not re-entrant.
    pub fn peek_tail_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let started = self.start_timer();
        let (out, contended) = self.with_chain(|chain| chain.tail().map(f));
        self.record(started, out.is_some(), contended);
        out
    }

    /// Tear the deque down, disposing of every remaining value
    ///
    /// Values are handed to the disposer from head to tail. Taking `self` by value
    /// guarantees no other thread can still reach the deque, so the lock is not taken.
    /// Returns the number of values disposed.
    pub fn free(mut self) -> usize {
        self.teardown(true)
    }

    /// Unlink every node from head to tail
    ///
    /// With `use_disposer` false the values are dropped in place.
    fn teardown(&mut self, use_disposer: bool) -> usize {
        let disposer = self.disposer.as_deref().filter(|_| use_disposer);
        let chain = self.chain.get_mut();
        let mut disposed = 0;
        while let Some(node) = chain.unlink_head() {
            if let Some(dispose) = disposer {
                dispose(node.value);
            }
            disposed += 1;
        }
        debug_assert_eq!(chain.len, 0);
        self.metrics.update_memory_usage(0);

        if disposed > 0 {
            tracing::trace!(disposed, "linked deque torn down");
        }
        disposed
    }

    /// Run `f` on the chain inside a critical section
    ///
    /// Also returns whether the lock was contended; only counted operations record it.
    #[inline]
    fn with_chain<R>(&self, f: impl FnOnce(&mut Chain<T>) -> R) -> (R, bool) {
        let (_guard, contended) = LockGuard::acquire(&self.lock);
        let metrics_enabled = self.is_metrics_enabled();

        // SAFETY: `_guard` gives this thread exclusive access until it drops
        let chain = unsafe { &mut *self.chain.get() };
        let out = f(&mut *chain);
        if metrics_enabled {
            self.metrics.update_memory_usage(chain.len * Node::<T>::SIZE);
        }
        (out, contended)
    }

    fn dispose(&self, value: T) {
        if let Some(dispose) = &self.disposer {
            dispose(value);
        }
    }

    #[inline]
    fn start_timer(&self) -> Option<Instant> {
        #[cfg(feature = "metrics")]
        {
            if self.is_metrics_enabled() {
                return Some(Instant::now());
            }
        }
        None
    }

    #[inline]
    fn record(&self, started: Option<Instant>, succeeded: bool, contended: bool) {
        if !self.is_metrics_enabled() {
            return;
        }
        if contended {
            self.metrics.record_contention();
        }
        if succeeded {
            let elapsed = started.map_or(Duration::ZERO, |start| start.elapsed());
            self.metrics.record_success(elapsed);
        } else {
            self.metrics.record_failure();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.with_chain(|chain| chain.is_consistent()).0
    }
}

impl<T, L: RawLock> MetricsCollector for LinkedDeque<T, L> {
    fn metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot(self.lock.failed_attempts())
    }

    fn reset_metrics(&self) {
        self.metrics.reset(self.lock.failed_attempts());
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }
}

impl<T, L: RawLock> Drop for LinkedDeque<T, L> {
    fn drop(&mut self) {
        // A disposer that panicked during `free` must not be re-entered while unwinding
        let unwinding = std::thread::panicking();
        if unwinding && self.disposer.is_some() {
            tracing::warn!(
                remaining = self.chain.get_mut().len,
                "linked deque dropped during a panic, remaining values bypass the disposer"
            );
        }
        self.teardown(!unwinding);
    }
}

impl<T, L: RawLock> Default for LinkedDeque<T, L> {
    fn default() -> Self {
        Self::with_lock(L::new())
    }
}

impl<T, L: RawLock + fmt::Debug> fmt::Debug for LinkedDeque<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedDeque")
            .field("len", &self.len())
            .field("lock", &self.lock)
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_links_both_ways() {
        let mut chain = Chain::new();
        assert!(chain.is_consistent());

        for i in 0..5 {
            chain.link_head(Node::boxed(i));
            assert!(chain.is_consistent());
        }
        assert_eq!(chain.head(), Some(&4));
        assert_eq!(chain.tail(), Some(&0));

        assert_eq!(chain.unlink_tail().map(|n| n.value), Some(0));
        assert_eq!(chain.unlink_head().map(|n| n.value), Some(4));
        assert!(chain.is_consistent());
        assert_eq!(chain.len, 3);

        while chain.unlink_tail().is_some() {}
        assert!(chain.is_consistent());
        assert!(chain.head.is_none() && chain.tail.is_none());
    }

    #[test]
    fn test_single_node_unlinks_from_either_end() {
        let mut chain = Chain::new();
        chain.link_head(Node::boxed("only"));
        assert_eq!(chain.head(), chain.tail());
        assert_eq!(chain.unlink_head().map(|n| n.value), Some("only"));
        assert!(chain.is_consistent());

        chain.link_head(Node::boxed("again"));
        assert_eq!(chain.unlink_tail().map(|n| n.value), Some("again"));
        assert!(chain.is_consistent());
        assert!(chain.unlink_tail().is_none());
    }

    #[test]
    fn test_debug_format() {
        let deque: LinkedDeque<i32> = LinkedDeque::new();
        deque.push_head(1);
        let debug_str = format!("{:?}", deque);
        assert!(debug_str.contains("LinkedDeque"));
        assert!(debug_str.contains("len: 1"));
        assert!(debug_str.contains("has_disposer: false"));
    }
}
