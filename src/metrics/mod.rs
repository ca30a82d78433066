//! Performance Metrics Module
//!
//! Operation counters, lock contention and node memory for the deque. Collection uses
//! relaxed atomics outside the critical section, so snapshots taken while other
//! threads are active are approximate.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Snapshot of the metrics collected for one data structure
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PerformanceMetrics {
    /// Total number of operations performed
    pub total_operations: u64,
    /// Number of successful operations
    pub successful_operations: u64,
    /// Number of failed operations (removals from an empty deque)
    pub failed_operations: u64,
    /// Number of operations that found the lock held and had to wait
    pub contended_operations: u64,
    /// Acquisition attempts the lock reported as failed, counting every retry
    pub failed_lock_attempts: u64,
    /// Average operation time in nanoseconds
    pub avg_operation_time_ns: u64,
    /// Maximum operation time in nanoseconds
    pub max_operation_time_ns: u64,
    /// Bytes currently held by list nodes
    pub memory_usage_bytes: usize,
    /// Highest value `memory_usage_bytes` has reached
    pub peak_memory_usage_bytes: usize,
}

impl PerformanceMetrics {
    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        Self::percentage(self.successful_operations, self.total_operations)
    }

    /// Calculate contention rate as percentage
    pub fn contention_rate(&self) -> f64 {
        Self::percentage(self.contended_operations, self.total_operations)
    }

    /// Calculate failure rate as percentage
    pub fn failure_rate(&self) -> f64 {
        Self::percentage(self.failed_operations, self.total_operations)
    }

    /// Get average operation time as Duration
    pub fn avg_operation_time(&self) -> Duration {
        Duration::from_nanos(self.avg_operation_time_ns)
    }

    /// Get maximum operation time as Duration
    pub fn max_operation_time(&self) -> Duration {
        Duration::from_nanos(self.max_operation_time_ns)
    }

    fn percentage(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }
}

/// Internal atomic metrics collection
#[derive(Debug, Default)]
pub(crate) struct AtomicMetrics {
    total_operations: AtomicU64,
    successful_operations: AtomicU64,
    failed_operations: AtomicU64,
    contended_operations: AtomicU64,
    total_time_ns: AtomicU64,
    max_time_ns: AtomicU64,
    memory_usage: AtomicUsize,
    peak_memory_usage: AtomicUsize,
    lock_failures_at_reset: AtomicU64,
}

impl AtomicMetrics {
    /// Record a successful operation with its duration
    pub(crate) fn record_success(&self, duration: Duration) {
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.successful_operations.fetch_add(1, Ordering::Relaxed);
        self.total_time_ns.fetch_add(duration_ns, Ordering::Relaxed);
        self.max_time_ns.fetch_max(duration_ns, Ordering::Relaxed);
    }

    /// Record a failed operation
    pub(crate) fn record_failure(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.failed_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation that had to wait for the lock
    pub(crate) fn record_contention(&self) {
        self.contended_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Update memory usage
    pub(crate) fn update_memory_usage(&self, usage: usize) {
        self.memory_usage.store(usage, Ordering::Relaxed);
        self.peak_memory_usage.fetch_max(usage, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    ///
    /// `lock_failures` is the lock's lifetime failed-attempt count.
    pub(crate) fn snapshot(&self, lock_failures: u64) -> PerformanceMetrics {
        let total_ops = self.total_operations.load(Ordering::Relaxed);
        let successful_ops = self.successful_operations.load(Ordering::Relaxed);
        let total_time = self.total_time_ns.load(Ordering::Relaxed);

        PerformanceMetrics {
            total_operations: total_ops,
            successful_operations: successful_ops,
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
            contended_operations: self.contended_operations.load(Ordering::Relaxed),
            failed_lock_attempts: lock_failures
                .saturating_sub(self.lock_failures_at_reset.load(Ordering::Relaxed)),
            avg_operation_time_ns: if successful_ops > 0 { total_time / successful_ops } else { 0 },
            max_operation_time_ns: self.max_time_ns.load(Ordering::Relaxed),
            memory_usage_bytes: self.memory_usage.load(Ordering::Relaxed),
            peak_memory_usage_bytes: self.peak_memory_usage.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    ///
    /// The lock's counter cannot be rewound, so its current value becomes the new zero.
    pub(crate) fn reset(&self, lock_failures: u64) {
        self.total_operations.store(0, Ordering::Relaxed);
        self.successful_operations.store(0, Ordering::Relaxed);
        self.failed_operations.store(0, Ordering::Relaxed);
        self.contended_operations.store(0, Ordering::Relaxed);
        self.total_time_ns.store(0, Ordering::Relaxed);
        self.max_time_ns.store(0, Ordering::Relaxed);
        self.lock_failures_at_reset.store(lock_failures, Ordering::Relaxed);
        // Memory usage reflects live state, peak restarts from it
        let usage = self.memory_usage.load(Ordering::Relaxed);
        self.peak_memory_usage.store(usage, Ordering::Relaxed);
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> PerformanceMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
