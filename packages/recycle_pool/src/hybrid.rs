use std::sync::OnceLock;

use tracing::debug;

use crate::{
    Pooled, RecyclerPool, StripeCount, StripedPool, StripedQueuePool, StripedStackPool,
    TaskDetector, ThreadLocalPool,
};

/// Hybrid over lock-free striped stacks.
pub type HybridStackPool = HybridDispatcher<StripedStackPool>;

/// Hybrid over striped lock-free queues.
pub type HybridQueuePool = HybridDispatcher<StripedQueuePool>;

/// Picks a pooling discipline per call, based on what kind of caller is asking.
///
/// * OS threads are served by a [`ThreadLocalPool`]: one cached buffer per thread, never
///   contended.
/// * Lightweight async tasks are served by a striped pool `P`, which copes with many tasks
///   being mid-operation on the same carrier thread at once.
///
/// The striped pool is only created when the first task shows up, so processes that never use
/// async tasks never pay for it. Creation happens exactly once even if many tasks race to be the
/// first.
///
/// Buffers from the striped pool carry a stripe tag, so on release they always go back to the
/// striped pool, no matter which kind of caller releases them. Untagged buffers go into the slot
/// of the releasing thread.
///
/// # Example
///
/// ```rust
/// use recycle_pool::{HybridStackPool, RecyclerPool, StripeCount, TaskDetector};
///
/// let pool = HybridStackPool::new(StripeCount::new(4).unwrap(), TaskDetector::from_fn(|| true));
///
/// let pooled = pool.acquire();
/// assert!(pooled.origin().is_some());
/// pool.release(pooled);
///
/// assert_eq!(pool.striped_pool().unwrap().free_count(), 1);
/// ```
#[derive(Debug)]
pub struct HybridDispatcher<P> {
    detector: TaskDetector,
    thread_local: ThreadLocalPool,
    stripes: StripeCount,
    striped: OnceLock<P>,
}

impl<P: StripedPool> HybridDispatcher<P> {
    /// Creates a dispatcher whose striped pool (once created) has `stripes` stripes.
    #[must_use]
    pub fn new(stripes: StripeCount, detector: TaskDetector) -> Self {
        Self {
            detector,
            thread_local: ThreadLocalPool::new(),
            stripes,
            striped: OnceLock::new(),
        }
    }

    /// Creates a dispatcher that detects async tasks via [`TaskDetector::resolve()`] and sizes
    /// its striped pool according to the available hardware parallelism.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(StripeCount::default(), TaskDetector::resolve())
    }

    /// The striped pool serving async tasks, if any async task has used the dispatcher yet.
    #[must_use]
    pub fn striped_pool(&self) -> Option<&P> {
        self.striped.get()
    }

    fn striped(&self) -> &P {
        self.striped.get_or_init(|| {
            debug!(
                stripes = self.stripes.get(),
                "first async task seen, creating striped pool"
            );

            P::with_stripe_count(self.stripes)
        })
    }
}

impl<P: StripedPool> RecyclerPool for HybridDispatcher<P> {
    fn acquire(&self) -> Pooled {
        if self.detector.is_lightweight_task() {
            self.striped().acquire()
        } else {
            self.thread_local.acquire()
        }
    }

    /// # Panics
    ///
    /// Panics if the buffer carries the stripe tag of a pool other than this dispatcher's
    /// striped pool.
    fn release(&self, pooled: Pooled) {
        if pooled.origin().is_some() {
            // Whoever releases it, a tagged buffer came from the striped pool and goes back there.
            self.striped().release(pooled);
        } else {
            self.thread_local.release(pooled);
        }
    }
}
