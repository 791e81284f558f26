use std::fmt::Debug;

use crate::{Pooled, ScratchBuffer, StripeCount};

/// A source of reusable [`ScratchBuffer`]s.
///
/// Every buffer obtained via [`acquire()`][1] must be handed back via [`release()`][2] exactly
/// once, on every exit path of the operation that used it. Prefer [`with_pooled()`][3], which
/// takes care of this even if the operation panics.
///
/// Neither operation ever blocks or fails. If the pool has no free buffer, a new one is created.
///
/// [1]: Self::acquire
/// [2]: Self::release
/// [3]: Self::with_pooled
pub trait RecyclerPool: Debug + Send + Sync {
    /// Takes a buffer out of the pool, creating a new one if the pool is empty.
    fn acquire(&self) -> Pooled;

    /// Returns a buffer to the pool.
    ///
    /// # Panics
    ///
    /// Implementations panic if the buffer was produced by a pool that it cannot be returned to
    /// (e.g. a different striped pool, or a stripe that does not exist in this pool).
    fn release(&self, pooled: Pooled);

    /// Runs `f` with an empty buffer borrowed from the pool, returning the buffer afterwards.
    ///
    /// The buffer is returned to the pool even if `f` panics.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::io::Write;
    ///
    /// use recycle_pool::{QueuePool, RecyclerPool};
    ///
    /// let pool = QueuePool::new();
    ///
    /// let len = pool.with_pooled(|buffer| {
    ///     write!(buffer, "{}", 12345).unwrap();
    ///     buffer.len()
    /// });
    ///
    /// assert_eq!(len, 5);
    /// assert_eq!(pool.len(), 1);
    /// ```
    fn with_pooled<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ScratchBuffer) -> R,
        Self: Sized,
    {
        let mut pooled = scopeguard::guard(self.acquire(), |pooled| self.release(pooled));

        pooled.clear();

        f(&mut **pooled)
    }
}

/// A pool that partitions its buffers into stripes and tags every buffer it hands out with the
/// stripe it came from.
///
/// Used as the async-task side of a [`HybridDispatcher`][crate::HybridDispatcher].
pub trait StripedPool: RecyclerPool {
    /// Creates the pool with the given number of stripes.
    fn with_stripe_count(stripes: StripeCount) -> Self
    where
        Self: Sized;

    /// The number of stripes in the pool.
    fn stripe_count(&self) -> usize;

    /// The number of buffers this pool has created over its lifetime.
    fn created_count(&self) -> usize;

    /// The number of buffers currently held by the pool.
    ///
    /// Advisory only if there are concurrent operations.
    fn free_count(&self) -> usize;
}
