//! Multi-thread tests for the lock backends

use super::*;
use crate::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;

/// Split load/store increments lose updates unless the lock excludes other threads.
fn hammer<L: RawLock + 'static>(num_threads: usize, iterations: usize) -> usize {
    let lock = Arc::new(L::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..iterations {
                    lock.lock();
                    let seen = counter.load(Ordering::Relaxed);
                    if i % 16 == 0 {
                        thread::yield_now();
                    }
                    counter.store(seen + 1, Ordering::Relaxed);
                    lock.unlock().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!lock.is_locked());
    counter.load(Ordering::Relaxed)
}

fn unlock_by_non_owner<L: RawLock + 'static>() {
    let lock = Arc::new(L::new());
    let (locked_tx, locked_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let holder = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            lock.lock();
            locked_tx.send(OwnerId::current()).unwrap();
            release_rx.recv().unwrap();
            lock.unlock()
        })
    };

    let holder_id = locked_rx.recv().unwrap();
    assert_eq!(lock.unlock(), Err(Error::NotOwner));
    assert!(lock.is_locked());
    assert_eq!(lock.owner(), Some(holder_id));

    release_tx.send(()).unwrap();
    assert_eq!(holder.join().unwrap(), Ok(()));
    assert!(!lock.is_locked());
    assert_eq!(lock.owner(), None);
}

#[test]
fn test_spin_mutual_exclusion() {
    assert_eq!(hammer::<SpinMutex>(8, 2_000), 16_000);
}

#[test]
fn test_parking_mutual_exclusion() {
    assert_eq!(hammer::<ParkingMutex>(8, 2_000), 16_000);
}

#[test]
fn test_spin_unlock_by_non_owner() {
    unlock_by_non_owner::<SpinMutex>();
}

#[test]
fn test_parking_unlock_by_non_owner() {
    unlock_by_non_owner::<ParkingMutex>();
}

#[test]
fn test_unlock_without_lock() {
    let spin = SpinMutex::new();
    assert_eq!(spin.unlock(), Err(Error::NotOwner));
    assert!(!spin.is_locked());

    let parking = ParkingMutex::new();
    assert_eq!(parking.unlock(), Err(Error::NotOwner));
    assert!(!parking.is_locked());
}

#[test]
fn test_guard_releases_on_drop() {
    let lock = SpinMutex::new();
    {
        let (_guard, contended) = LockGuard::acquire(&lock);
        assert!(!contended);
        assert!(lock.is_locked());
    }
    assert!(!lock.is_locked());
    assert_eq!(lock.owner(), None);
}

#[test]
fn test_guard_reports_contention() {
    let lock = Arc::new(SpinMutex::new());
    lock.lock();

    let (started_tx, started_rx) = mpsc::channel();
    let waiter = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            started_tx.send(()).unwrap();
            let (_guard, contended) = LockGuard::acquire(&*lock);
            contended
        })
    };

    started_rx.recv().unwrap();
    thread::sleep(std::time::Duration::from_millis(50));
    lock.unlock().unwrap();

    assert!(waiter.join().unwrap());
    assert!(!lock.is_locked());
}
