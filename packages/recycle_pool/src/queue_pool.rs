use crossbeam::queue::SegQueue;
use tracing::trace;

use crate::metrics::observe_acquire;
use crate::{Pooled, RecyclerPool, ScratchBuffer};

/// A pool backed by a single unbounded lock-free queue shared by all callers.
///
/// Simple and fair, with no affinity between callers and buffers. Under heavy parallelism the
/// head and tail of the queue become a point of contention for all processors.
///
/// # Example
///
/// ```rust
/// use recycle_pool::{QueuePool, RecyclerPool};
///
/// let pool = QueuePool::new();
///
/// let pooled = pool.acquire();
/// let id = pooled.id();
/// pool.release(pooled);
///
/// assert_eq!(pool.acquire().id(), id);
/// ```
#[derive(Debug, Default)]
pub struct QueuePool {
    queue: SegQueue<ScratchBuffer>,
}

impl QueuePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    /// The number of buffers currently held by the pool.
    ///
    /// Advisory only if there are concurrent operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the pool currently holds no buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl RecyclerPool for QueuePool {
    fn acquire(&self) -> Pooled {
        let buffer = self.queue.pop();
        observe_acquire(buffer.is_some());

        Pooled::untagged(buffer.unwrap_or_else(|| {
            trace!("queue pool empty, creating buffer");
            ScratchBuffer::new()
        }))
    }

    /// # Panics
    ///
    /// Panics if the buffer came from a striped pool.
    fn release(&self, pooled: Pooled) {
        self.queue.push(pooled.expect_untagged("queue pool"));
    }
}
