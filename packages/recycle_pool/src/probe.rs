use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// The fractional part of the golden ratio scaled to 32 bits. Multiplying by it scatters
/// consecutive integers evenly over the 32-bit space (Fibonacci hashing).
const GOLDEN_RATIO_32: u32 = 0x9E37_79B9;

static NEXT_CALLER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CALLER_ID: Cell<u64> = const { Cell::new(0) };
}

/// Returns an identifier of the current OS thread, unique within the process.
///
/// Identifiers are assigned sequentially on first use by each thread and are never zero.
#[must_use]
pub fn current_caller_id() -> u64 {
    CALLER_ID
        .try_with(|id| {
            let existing = id.get();

            if existing != 0 {
                return existing;
            }

            let assigned = NEXT_CALLER_ID.fetch_add(1, Ordering::Relaxed);
            id.set(assigned);
            assigned
        })
        // The thread is being torn down. Any identity will do because routing by the probe
        // is only an affinity hint, so we fall back to a shared identity.
        .unwrap_or(0)
}

/// Maps the calling thread to a stripe index without any coordination between threads.
///
/// The index is recalculated on every call. An async task may be running on a different carrier
/// thread every time it calls into a pool, so caching the index per task would defeat the point.
#[derive(Clone, Copy, Debug)]
pub struct ThreadProbe {
    mask: usize,
}

impl ThreadProbe {
    /// Creates a probe that produces indexes in `[0, mask]`.
    ///
    /// `mask` is expected to be one less than a power of two.
    #[must_use]
    pub const fn new(mask: usize) -> Self {
        Self { mask }
    }

    /// The stripe index for the calling thread.
    #[must_use]
    pub fn index(&self) -> usize {
        Self::index_for(current_caller_id(), self.mask)
    }

    /// The stripe index for a caller with the given identity.
    ///
    /// Deterministic and allocation-free.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "only the low 32 bits of the identity take part in the hash"
    )]
    pub fn index_for(caller: u64, mask: usize) -> usize {
        let mut probe = (caller as u32).wrapping_mul(GOLDEN_RATIO_32) & 0x7FFF_FFFF;

        probe ^= probe << 13;
        probe ^= probe >> 17;
        probe ^= probe << 5;

        (probe as usize) & mask
    }
}
