use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;
use crossbeam::utils::CachePadded;
use tracing::{debug, trace};

use crate::metrics::observe_acquire;
use crate::{
    PoolId, Pooled, RecyclerPool, ScratchBuffer, StripeCount, StripeTag, StripedPool, ThreadProbe,
};

/// A pool made of independent lock-free queues, one per stripe, with callers routed to a stripe
/// by hashing the identity of the calling thread.
///
/// Same routing and tagging rules as [`StripedStackPool`][crate::StripedStackPool], but each
/// stripe hands out its buffers in FIFO order.
#[derive(Debug)]
pub struct StripedQueuePool {
    id: PoolId,
    probe: ThreadProbe,
    queues: Box<[CachePadded<SegQueue<ScratchBuffer>>]>,
    created: AtomicUsize,
}

impl StripedQueuePool {
    /// Creates a pool with the given number of stripes.
    #[must_use]
    pub fn new(stripes: StripeCount) -> Self {
        let id = PoolId::next();

        debug!(?id, stripes = stripes.get(), "creating striped queue pool");

        Self {
            id,
            probe: ThreadProbe::new(stripes.mask()),
            queues: iter::repeat_with(|| CachePadded::new(SegQueue::new()))
                .take(stripes.get())
                .collect(),
            created: AtomicUsize::new(0),
        }
    }

    /// The identity of this pool, as recorded in the tags of its buffers.
    #[must_use]
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// The number of buffers currently held by stripe `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than the number of stripes.
    #[must_use]
    pub fn stripe_free_count(&self, index: usize) -> usize {
        self.queue(index).len()
    }

    #[allow(
        clippy::indexing_slicing,
        reason = "callers derive the index from the stripe mask or validate the stripe tag"
    )]
    fn queue(&self, index: usize) -> &SegQueue<ScratchBuffer> {
        &self.queues[index]
    }
}

impl RecyclerPool for StripedQueuePool {
    fn acquire(&self) -> Pooled {
        let index = self.probe.index();
        let buffer = self.queue(index).pop();

        observe_acquire(buffer.is_some());

        let buffer = buffer.unwrap_or_else(|| {
            trace!(stripe = index, "stripe empty, creating buffer");

            self.created.fetch_add(1, Ordering::Relaxed);
            ScratchBuffer::new()
        });

        Pooled::tagged(buffer, StripeTag::new(self.id, index))
    }

    /// # Panics
    ///
    /// Panics if the buffer was not acquired from this pool.
    fn release(&self, pooled: Pooled) {
        let index = pooled.expect_stripe_of(self.id, self.queues.len());

        self.queue(index).push(pooled.into_buffer());
    }
}

impl StripedPool for StripedQueuePool {
    fn with_stripe_count(stripes: StripeCount) -> Self {
        Self::new(stripes)
    }

    fn stripe_count(&self) -> usize {
        self.queues.len()
    }

    fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn free_count(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(StripedQueuePool: Send, Sync);

    fn pool_with(stripes: i32) -> StripedQueuePool {
        StripedQueuePool::new(StripeCount::new(stripes).unwrap())
    }

    #[test]
    fn acquire_tags_with_probed_stripe() {
        let pool = pool_with(8);

        let pooled = pool.acquire();
        let origin = pooled.origin().unwrap();

        assert_eq!(origin.pool(), pool.id());
        assert_eq!(origin.stripe(), ThreadProbe::new(7).index());
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn same_thread_reuses_same_buffer() {
        let pool = pool_with(4);

        let pooled = pool.acquire();
        let id = pooled.id();
        pool.release(pooled);

        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.acquire().id(), id);
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
        assert_eq!(pool.stripe_count(), 16);
    }

    #[test]
    #[should_panic]
    fn release_into_other_pool_panics() {
        let source = pool_with(2);
        let target = pool_with(2);

        target.release(source.acquire());
    }
}
