//! Metrics for the recycling pools.
//!
//! The events are per-thread instances so that observing them never becomes a point of
//! contention of its own.

use nm::{Event, Magnitude};

/// Histogram buckets for the number of failed compare-and-swap attempts before a stripe
/// operation succeeded.
///
/// Anything beyond a handful of retries indicates that too many callers share one stripe.
const CAS_RETRIES_BUCKETS: &[Magnitude] = &[1, 2, 4, 8, 16, 64];

thread_local! {
    /// An acquire was served from a buffer already held by the pool.
    pub(crate) static ACQUIRE_HITS: Event = Event::builder()
        .name("recycle_pool_acquire_hits")
        .build();

    /// An acquire found the pool empty and had to create a new buffer.
    pub(crate) static ACQUIRE_MISSES: Event = Event::builder()
        .name("recycle_pool_acquire_misses")
        .build();

    /// A stripe operation had to retry due to a concurrent update of the same stripe.
    ///
    /// The magnitude is the number of retries.
    pub(crate) static CAS_RETRIES: Event = Event::builder()
        .name("recycle_pool_cas_retries")
        .histogram(CAS_RETRIES_BUCKETS)
        .build();
}

// Pools may be used from thread-local destructors, after these events are gone.
#[cfg_attr(test, mutants::skip)] // Metrics are not observable from tests.
pub(crate) fn observe_acquire(hit: bool) {
    if hit {
        _ = ACQUIRE_HITS.try_with(|e| e.observe_once());
    } else {
        _ = ACQUIRE_MISSES.try_with(|e| e.observe_once());
    }
}

#[cfg_attr(test, mutants::skip)] // Metrics are not observable from tests.
pub(crate) fn observe_cas_retries(retries: u32) {
    if retries > 0 {
        _ = CAS_RETRIES.try_with(|e| e.observe(retries));
    }
}
