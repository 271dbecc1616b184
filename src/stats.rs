//! Global operation counters for diagnostics and tests.

use std::sync::atomic::AtomicU64;
use std::sync::OnceLock;

/// Counters for every library operation.
///
/// All counters are updated with relaxed atomics; they are monotonic
/// totals, not a consistent snapshot.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    /// Blocks allocated.
    pub allocations: AtomicU64,
    /// Blocks returned to the system allocator.
    pub deallocations: AtomicU64,
    /// Retain calls.
    pub retains: AtomicU64,
    /// Release calls.
    pub releases: AtomicU64,
    /// Destructors run (at most one per block).
    pub destructor_runs: AtomicU64,
    /// Link edges recorded.
    pub links_created: AtomicU64,
    /// Link calls rejected (cycle or node allocation failure).
    pub links_rejected: AtomicU64,
    /// Edges tombstoned.
    pub unlinks: AtomicU64,
}

/// Global stats instance.
static RUNTIME_STATS: OnceLock<RuntimeStats> = OnceLock::new();

/// Get the global stats instance.
pub fn runtime_stats() -> &'static RuntimeStats {
    RUNTIME_STATS.get_or_init(RuntimeStats::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Ref;
    use std::sync::atomic::Ordering;

    #[test]
    fn lifecycle_moves_the_counters() {
        let stats = runtime_stats();
        let allocs = stats.allocations.load(Ordering::Relaxed);
        let deallocs = stats.deallocations.load(Ordering::Relaxed);

        let r = Ref::allocate(64).unwrap();
        unsafe {
            r.retain();
            r.release();
            r.release();
        }

        // Other tests run in parallel against the same globals, so only
        // monotonic progress can be asserted.
        assert!(stats.allocations.load(Ordering::Relaxed) > allocs);
        assert!(stats.deallocations.load(Ordering::Relaxed) > deallocs);

        // Every release is preceded by an allocate or retain. Reading
        // releases first keeps the comparison sound while other tests
        // advance the counters concurrently.
        let releases = stats.releases.load(Ordering::Relaxed);
        let acquisitions = stats.allocations.load(Ordering::Relaxed)
            + stats.retains.load(Ordering::Relaxed);
        assert!(releases <= acquisitions);
    }
}
