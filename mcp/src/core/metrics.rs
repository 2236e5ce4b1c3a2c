//! Registry metrics for monitoring connection lifecycle.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for registry operations.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    // Registration metrics
    registrations: AtomicU64,
    connected: AtomicU64,
    disabled: AtomicU64,
    fatal_failures: AtomicU64,

    // Retry metrics
    retries_scheduled: AtomicU64,
    retries_executed: AtomicU64,
    retries_exhausted: AtomicU64,

    // Handle metrics
    handles_opened: AtomicU64,
    handles_closed: AtomicU64,

    // Discovery metrics
    discovery_failures: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connected(&self) {
        self.connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disabled(&self) {
        self.disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_failure(&self) {
        self.fatal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_executed(&self) {
        self.retries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a client handle built by the factory.
    pub fn record_handle_opened(&self) {
        self.handles_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a client handle closed.
    pub fn record_handle_closed(&self) {
        self.handles_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovery_failure(&self) {
        self.discovery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed),
            disabled: self.disabled.load(Ordering::Relaxed),
            fatal_failures: self.fatal_failures.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            retries_executed: self.retries_executed.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            handles_opened: self.handles_opened.load(Ordering::Relaxed),
            handles_closed: self.handles_closed.load(Ordering::Relaxed),
            discovery_failures: self.discovery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of registry metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub registrations: u64,
    pub connected: u64,
    pub disabled: u64,
    pub fatal_failures: u64,
    pub retries_scheduled: u64,
    pub retries_executed: u64,
    pub retries_exhausted: u64,
    pub handles_opened: u64,
    pub handles_closed: u64,
    pub discovery_failures: u64,
}

impl MetricsSnapshot {
    /// Handles built but not yet closed.
    pub fn open_handles(&self) -> u64 {
        self.handles_opened.saturating_sub(self.handles_closed)
    }
}
