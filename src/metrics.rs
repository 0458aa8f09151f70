use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the refresher.
///
/// Purpose:
/// - Track runs (started / completed / timed out / failed)
/// - Track per-item outcomes across all runs
/// - Track rejected triggers while a run is in flight
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Runs
    pub runs_started: AtomicUsize,
    pub runs_completed: AtomicUsize,
    pub runs_timed_out: AtomicUsize,
    pub runs_failed: AtomicUsize,

    // Triggers that found a run already active
    pub triggers_rejected: AtomicUsize,

    // Per-item outcomes, cumulative across runs
    pub requests_sent: AtomicUsize,
    pub items_fetched: AtomicUsize,
    pub item_failures: AtomicUsize,
    pub retries_attempted: AtomicUsize,

    pub recovery_periods: AtomicUsize,
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
