//! Deque (double-ended queue) implementations
//!
//! ## Available Deques
//!
//! - [`LinkedDeque`]: doubly linked list guarded by a swappable [`RawLock`](crate::RawLock)
//!
//! ## Choosing a Lock Backend
//!
//! - Keep the default [`SpinMutex`](crate::SpinMutex) for short critical sections on
//!   machines with a core per busy thread
//! - Use [`ParkingMutex`](crate::ParkingMutex) when threads outnumber cores and
//!   spinning would burn time slices

pub mod linked;

pub use self::linked::{Disposer, LinkedDeque};


#[cfg(test)]
mod proptests;
