//! Global atomic counters for evaluation observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a CLI command finishes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    events_drained: AtomicU64,
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_cancelled: AtomicU64,
    evaluator_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_drained: AtomicU64::new(0),
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_cancelled: AtomicU64::new(0),
            evaluator_failures: AtomicU64::new(0),
        }
    }

    /// One event pulled from an event feed.
    pub fn inc_events_drained(&self) {
        self.events_drained.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_drained", "counter incremented");
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_completed", "counter incremented");
    }

    pub fn inc_runs_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_cancelled", "counter incremented");
    }

    pub fn inc_evaluator_failures(&self) {
        self.evaluator_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluator_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_drained = self.events_drained(),
            runs_started = self.runs_started(),
            runs_completed = self.runs_completed(),
            runs_cancelled = self.runs_cancelled(),
            evaluator_failures = self.evaluator_failures(),
        );
    }

    pub fn events_drained(&self) -> u64 {
        self.events_drained.load(Ordering::Relaxed)
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_cancelled(&self) -> u64 {
        self.runs_cancelled.load(Ordering::Relaxed)
    }

    pub fn evaluator_failures(&self) -> u64 {
        self.evaluator_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.events_drained.store(0, Ordering::Relaxed);
        self.runs_started.store(0, Ordering::Relaxed);
        self.runs_completed.store(0, Ordering::Relaxed);
        self.runs_cancelled.store(0, Ordering::Relaxed);
        self.evaluator_failures.store(0, Ordering::Relaxed);
    }
}
