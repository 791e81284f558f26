use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use tracing::{debug, trace};

use crate::metrics::{observe_acquire, observe_cas_retries};
use crate::{
    PoolId, Pooled, RecyclerPool, ScratchBuffer, Stripe, StripeCount, StripeTag, StripedPool,
    ThreadProbe,
};

/// A pool made of independent lock-free stacks ("stripes"), with callers routed to a stripe by
/// hashing the identity of the calling thread.
///
/// With `N` stripes, contention between callers is reduced to roughly `1/N` of what a single
/// shared structure would see. Each stripe head sits on its own cache line, so callers on
/// adjacent stripes do not slow each other down via false sharing.
///
/// Every buffer handed out is tagged with its stripe and goes back to that stripe on release,
/// regardless of which thread releases it.
///
/// # Example
///
/// ```rust
/// use recycle_pool::{RecyclerPool, StripeCount, StripedStackPool};
///
/// let pool = StripedStackPool::new(StripeCount::new(4).unwrap());
///
/// let pooled = pool.acquire();
/// let stripe = pooled.origin().unwrap().stripe();
/// assert!(stripe < 4);
///
/// pool.release(pooled);
/// assert_eq!(pool.stripe_free_count(stripe), 1);
/// ```
#[derive(Debug)]
pub struct StripedStackPool {
    id: PoolId,
    probe: ThreadProbe,
    stripes: Box<[CachePadded<Stripe>]>,
    created: AtomicUsize,
}

impl StripedStackPool {
    /// Creates a pool with the given number of stripes.
    #[must_use]
    pub fn new(stripes: StripeCount) -> Self {
        let id = PoolId::next();

        debug!(?id, stripes = stripes.get(), "creating striped stack pool");

        Self {
            id,
            probe: ThreadProbe::new(stripes.mask()),
            stripes: iter::repeat_with(|| CachePadded::new(Stripe::new()))
                .take(stripes.get())
                .collect(),
            created: AtomicUsize::new(0),
        }
    }

    /// Creates a pool with one stripe per unit of hardware parallelism.
    #[must_use]
    pub fn with_default_stripes() -> Self {
        Self::new(StripeCount::default())
    }

    /// The identity of this pool, as recorded in the tags of its buffers.
    #[must_use]
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// The number of stripes in the pool.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// The number of buffers currently held by stripe `index`.
    ///
    /// Advisory only if there are concurrent operations.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`stripe_count()`][Self::stripe_count].
    #[must_use]
    pub fn stripe_free_count(&self, index: usize) -> usize {
        self.stripe(index).len()
    }

    /// The number of buffers currently held by the pool, across all stripes.
    ///
    /// Advisory only if there are concurrent operations.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.stripes.iter().map(|s| s.len()).sum()
    }

    /// The number of buffers this pool has created over its lifetime.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Takes a buffer from a specific stripe, creating one tagged with that stripe if the stripe
    /// is empty.
    pub(crate) fn acquire_from_stripe(&self, index: usize) -> Pooled {
        let (buffer, retries) = self.stripe(index).pop();

        observe_cas_retries(retries);
        observe_acquire(buffer.is_some());

        let buffer = buffer.unwrap_or_else(|| {
            trace!(stripe = index, "stripe empty, creating buffer");

            self.created.fetch_add(1, Ordering::Relaxed);
            ScratchBuffer::new()
        });

        Pooled::tagged(buffer, StripeTag::new(self.id, index))
    }

    #[allow(
        clippy::indexing_slicing,
        reason = "callers derive the index from the stripe mask or validate the stripe tag"
    )]
    fn stripe(&self, index: usize) -> &Stripe {
        &self.stripes[index]
    }
}

impl Default for StripedStackPool {
    fn default() -> Self {
        Self::with_default_stripes()
    }
}

impl RecyclerPool for StripedStackPool {
    fn acquire(&self) -> Pooled {
        self.acquire_from_stripe(self.probe.index())
    }

    /// # Panics
    ///
    /// Panics if the buffer was not acquired from this pool.
    fn release(&self, pooled: Pooled) {
        // The tag decides, not the releasing thread. An async task may have moved to a
        // different carrier thread since it acquired the buffer.
        let index = pooled.expect_stripe_of(self.id, self.stripes.len());

        let retries = self.stripe(index).push(pooled.into_buffer());
        observe_cas_retries(retries);
    }
}

impl StripedPool for StripedStackPool {
    fn with_stripe_count(stripes: StripeCount) -> Self {
        Self::new(stripes)
    }

    fn stripe_count(&self) -> usize {
        self.stripe_count()
    }

    fn created_count(&self) -> usize {
        self.created_count()
    }

    fn free_count(&self) -> usize {
        self.free_count()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(StripedStackPool: Send, Sync);

    fn pool_with(stripes: i32) -> StripedStackPool {
        StripedStackPool::new(StripeCount::new(stripes).unwrap())
    }

    #[test]
    fn stripe_count_is_rounded() {
        assert_eq!(pool_with(3).stripe_count(), 4);
        assert_eq!(pool_with(1).stripe_count(), 1);
    }

    #[test]
    fn acquire_from_empty_pool_creates_tagged_buffer() {
        let pool = pool_with(4);

        let pooled = pool.acquire();
        let origin = pooled.origin().unwrap();

        assert_eq!(origin.pool(), pool.id());
        assert!(origin.stripe() < 4);
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.free_count(), 0);

        pool.release(pooled);
    }

    #[test]
    fn same_thread_reuses_same_buffer() {
        let pool = pool_with(8);

        let pooled = pool.acquire();
        let id = pooled.id();
        pool.release(pooled);

        let again = pool.acquire();
        assert_eq!(again.id(), id);
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn buffers_on_one_stripe_are_lifo() {
        let pool = pool_with(2);

        let a = pool.acquire_from_stripe(1);
        let b = pool.acquire_from_stripe(1);
        let (a_id, b_id) = (a.id(), b.id());

        pool.release(a);
        pool.release(b);

        assert_eq!(pool.acquire_from_stripe(1).id(), b_id);
        assert_eq!(pool.acquire_from_stripe(1).id(), a_id);
    }

    #[test]
    fn release_goes_to_tagged_stripe() {
        let pool = pool_with(4);

        let pooled = pool.acquire_from_stripe(2);
        pool.release(pooled);

        assert_eq!(pool.stripe_free_count(2), 1);
        assert_eq!(pool.free_count(), 1);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn release_from_other_thread_goes_to_tagged_stripe() {
        let pool = Arc::new(pool_with(16));

        let pooled = pool.acquire();
        let stripe = pooled.origin().unwrap().stripe();

        thread::spawn({
            let pool = Arc::clone(&pool);
            move || pool.release(pooled)
        })
        .join()
        .unwrap();

        assert_eq!(pool.stripe_free_count(stripe), 1);
    }

    #[test]
    #[should_panic]
    fn release_of_untagged_buffer_panics() {
        let pool = pool_with(4);

        pool.release(Pooled::untagged(ScratchBuffer::new()));
    }

    #[test]
    #[should_panic]
    fn release_into_other_pool_panics() {
        let source = pool_with(4);
        let target = pool_with(4);

        target.release(source.acquire());
    }

    #[test]
    #[should_panic]
    fn release_into_smaller_pool_panics() {
        let pool = pool_with(4);
        let bogus = Pooled::tagged(ScratchBuffer::new(), StripeTag::new(pool.id(), 9));

        pool.release(bogus);
    }

    #[test]
    fn stripe_fidelity_under_random_sequences() {
        const STRIPES: usize = 8;

        let pool = pool_with(8);
        let mut rng = StdRng::seed_from_u64(0x5EED);

        // Which stripe each buffer was born on, and which buffers each stripe holds right now.
        let mut birth_stripe = HashMap::new();
        let mut free_per_stripe: Vec<HashSet<u64>> = vec![HashSet::new(); STRIPES];
        let mut held: Vec<Pooled> = Vec::new();

        for _ in 0..10_000 {
            let should_acquire = held.is_empty() || rng.random_bool(0.5);

            if should_acquire {
                let stripe = rng.random_range(0..STRIPES);
                let pooled = pool.acquire_from_stripe(stripe);
                let id = pooled.id();

                assert_eq!(pooled.origin().unwrap().stripe(), stripe);

                let born_on = *birth_stripe.entry(id).or_insert(stripe);
                assert_eq!(born_on, stripe, "buffer {id} surfaced on a foreign stripe");

                if !free_per_stripe[stripe].remove(&id) {
                    // Not previously free, so it must be brand new.
                    assert_eq!(birth_stripe.len(), pool.created_count());
                }

                held.push(pooled);
            } else {
                let index = rng.random_range(0..held.len());
                let pooled = held.swap_remove(index);
                let stripe = pooled.origin().unwrap().stripe();

                free_per_stripe[stripe].insert(pooled.id());
                pool.release(pooled);
            }

            for (stripe, free) in free_per_stripe.iter().enumerate() {
                assert_eq!(pool.stripe_free_count(stripe), free.len());
            }
        }
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn concurrent_holders_never_share_a_buffer() {
        const THREADS: usize = 8;
        const ITERATIONS: usize = 2000;

        let pool = Arc::new(pool_with(2));
        let held = Arc::new(Mutex::new(HashSet::new()));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles = (0..THREADS)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let held = Arc::clone(&held);
                let barrier = Arc::clone(&barrier);

                thread::spawn(move || {
                    barrier.wait();

                    for _ in 0..ITERATIONS {
                        let pooled = pool.acquire();
                        assert!(
                            held.lock().unwrap().insert(pooled.id()),
                            "buffer {} handed out twice",
                            pooled.id()
                        );

                        assert!(held.lock().unwrap().remove(&pooled.id()));
                        pool.release(pooled);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.free_count(), pool.created_count());
        assert!(pool.created_count() <= THREADS);
    }
}
