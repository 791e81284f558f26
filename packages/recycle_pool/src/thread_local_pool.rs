use std::cell::Cell;

use crate::{Pooled, RecyclerPool, ScratchBuffer};

thread_local! {
    static CACHED: Cell<Option<ScratchBuffer>> = const { Cell::new(None) };
}

/// A pool that caches one buffer per OS thread.
///
/// Nothing is ever shared between threads, so there is no synchronization and no contention.
/// This is ideal for callers that have long-lived exclusive use of their thread. It is a poor fit
/// for async tasks, where many tasks may be mid-operation on the same carrier thread at once
/// and all but one of them would miss the cache.
///
/// The per-thread slot is shared by all `ThreadLocalPool` values in the process.
///
/// # Example
///
/// ```rust
/// use recycle_pool::{RecyclerPool, ThreadLocalPool};
///
/// let pool = ThreadLocalPool::new();
///
/// let pooled = pool.acquire();
/// let id = pooled.id();
/// pool.release(pooled);
///
/// assert_eq!(pool.acquire().id(), id);
/// ```
#[derive(Debug, Default)]
pub struct ThreadLocalPool;

impl ThreadLocalPool {
    /// Creates the pool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether the current thread has a cached buffer.
    #[must_use]
    pub fn has_cached(&self) -> bool {
        CACHED
            .try_with(|slot| {
                let cached = slot.take();
                let present = cached.is_some();
                slot.set(cached);
                present
            })
            .unwrap_or(false)
    }
}

impl RecyclerPool for ThreadLocalPool {
    fn acquire(&self) -> Pooled {
        // Taking the buffer out of the slot means a thread can never hand out the same buffer
        // twice. If the slot is already gone (thread teardown), we just create a new buffer.
        let cached = CACHED.try_with(Cell::take).ok().flatten();

        Pooled::untagged(cached.unwrap_or_else(ScratchBuffer::new))
    }

    /// Stores the buffer in the slot of the current thread, dropping any previous occupant.
    ///
    /// # Panics
    ///
    /// Panics if the buffer came from a striped pool.
    fn release(&self, pooled: Pooled) {
        let buffer = pooled.expect_untagged("thread-local pool");

        // If the slot is already gone (thread teardown), the buffer is simply dropped.
        _ = CACHED.try_with(|slot| slot.set(Some(buffer)));
    }
}
