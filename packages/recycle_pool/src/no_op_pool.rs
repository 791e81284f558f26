use crate::{Pooled, RecyclerPool, ScratchBuffer};

/// A "pool" that does not pool anything.
///
/// Every acquire creates a new buffer and every release drops the buffer. Useful as a baseline
/// when measuring what the other strategies gain.
#[derive(Debug, Default)]
pub struct NoOpPool;

impl NoOpPool {
    /// Creates the pool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RecyclerPool for NoOpPool {
    fn acquire(&self) -> Pooled {
        Pooled::untagged(ScratchBuffer::new())
    }

    fn release(&self, pooled: Pooled) {
        drop(pooled);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn never_reuses() {
        let pool = NoOpPool::new();

        let first = pool.acquire();
        let first_id = first.id();
        pool.release(first);

        let second = pool.acquire();
        assert_ne!(second.id(), first_id);
        assert!(second.origin().is_none());
    }
}
