//! Basic usage example for spindeque
//!
//! Producers push at the head, consumers pop at the tail, and a disposer accounts
//! for whatever the deque discards on our behalf.

use spindeque::{Error, LinkedDeque, MetricsCollector, SpinMutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("spindeque Usage Example");
    println!("=======================");

    let disposed = Arc::new(AtomicUsize::new(0));
    let deque = Arc::new(LinkedDeque::with_disposer({
        let disposed = Arc::clone(&disposed);
        move |job: String| {
            disposed.fetch_add(1, Ordering::Relaxed);
            println!("   Disposed {}", job);
        }
    }));

    // Basic operations
    println!("\n1. Basic Operations:");
    deque.push_head("first".to_string());
    deque.push_head("second".to_string());
    println!("   Head: {:?}, Tail: {:?}", deque.peek_head(), deque.peek_tail());
    println!("   Popped: {:?}", deque.pop_tail());
    deque.drop_tail()?;

    // Multi-producer
    println!("\n2. Multi-Producer:");
    let producer_handles: Vec<_> = (0..4)
        .map(|i| {
            let deque = Arc::clone(&deque);
            thread::spawn(move || {
                for j in 0..25 {
                    deque.push_head(format!("job-{}-{}", i, j));
                }
                println!("   Producer {} finished", i);
            })
        })
        .collect();

    for handle in producer_handles {
        handle.join().unwrap();
    }

    // Multi-consumer
    println!("\n3. Multi-Consumer:");
    let consumed = Arc::new(AtomicUsize::new(0));
    let consumer_handles: Vec<_> = (0..3)
        .map(|i| {
            let deque = Arc::clone(&deque);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut mine = 0;
                while mine < 30 {
                    match deque.pop_tail() {
                        Some(_) => {
                            mine += 1;
                            consumed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => thread::sleep(Duration::from_micros(50)),
                    }
                }
                println!("   Consumer {} took {} jobs", i, mine);
            })
        })
        .collect();

    for handle in consumer_handles {
        handle.join().unwrap();
    }

    println!("\n4. Results:");
    println!("   Consumed: {}", consumed.load(Ordering::Relaxed));
    println!("   Remaining: {}", deque.len());

    let metrics = deque.metrics();
    println!("   Operations: {}", metrics.total_operations);
    println!("   Contention rate: {:.2}%", metrics.contention_rate());
    println!("   Failed lock attempts: {}", metrics.failed_lock_attempts);
    println!("   Avg operation time: {:?}", metrics.avg_operation_time());

    // Error handling
    println!("\n5. Error Handling:");
    let empty: LinkedDeque<u32> = LinkedDeque::new();
    match empty.drop_tail() {
        Err(Error::Empty) => println!("   Dropping from an empty deque is reported"),
        other => println!("   Unexpected result: {:?}", other),
    }

    let mutex = SpinMutex::new();
    match mutex.unlock() {
        Err(Error::NotOwner) => println!("   Unlocking a lock we do not hold is refused"),
        other => println!("   Unexpected result: {:?}", other),
    }

    // Teardown
    println!("\n6. Teardown:");
    let deque = Arc::try_unwrap(deque).map_err(|_| "deque still shared")?;
    let freed = deque.free();
    println!("   Freed {} remaining jobs, {} disposed in total", freed, disposed.load(Ordering::Relaxed));

    Ok(())
}
