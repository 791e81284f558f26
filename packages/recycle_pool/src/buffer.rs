use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A reusable chunk of transient working memory for an encoder.
///
/// The buffer keeps its capacity across acquire/release cycles, which is the whole point of
/// pooling it. The contents are whatever the previous user left behind - call [`clear()`][1]
/// before use if that matters ([`RecyclerPool::with_pooled()`][2] does this for you).
///
/// Every buffer has a process-unique [`id()`][3]. Two buffers are the same buffer if and only
/// if their identifiers are equal.
///
/// [1]: Self::clear
/// [2]: crate::RecyclerPool::with_pooled
/// [3]: Self::id
#[derive(Debug)]
pub struct ScratchBuffer {
    id: u64,
    bytes: Vec<u8>,
}

impl ScratchBuffer {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            bytes: Vec::new(),
        }
    }

    /// The identity of the buffer, unique within the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The bytes written into the buffer since it was last cleared.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Direct access to the underlying storage.
    #[must_use]
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Number of bytes currently in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer contains no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// How many bytes the buffer can hold without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Discards the contents, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl io::Write for ScratchBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.bytes.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Identifies one striped pool instance within the process.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Records which stripe of which pool produced a buffer.
///
/// A tagged buffer must be released to exactly that stripe of exactly that pool.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StripeTag {
    pool: PoolId,
    stripe: usize,
}

impl StripeTag {
    pub(crate) fn new(pool: PoolId, stripe: usize) -> Self {
        Self { pool, stripe }
    }

    /// The pool that produced the buffer.
    #[must_use]
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// The index of the stripe that produced the buffer.
    #[must_use]
    pub fn stripe(&self) -> usize {
        self.stripe
    }
}

/// A [`ScratchBuffer`] on loan from a pool, together with its routing information.
///
/// Obtained from [`RecyclerPool::acquire()`][1] and handed back via
/// [`RecyclerPool::release()`][2]. Dereferences to the buffer.
///
/// [1]: crate::RecyclerPool::acquire
/// [2]: crate::RecyclerPool::release
#[derive(Debug)]
pub struct Pooled {
    buffer: ScratchBuffer,
    origin: Option<StripeTag>,
}

impl Pooled {
    pub(crate) fn untagged(buffer: ScratchBuffer) -> Self {
        Self {
            buffer,
            origin: None,
        }
    }

    pub(crate) fn tagged(buffer: ScratchBuffer, origin: StripeTag) -> Self {
        Self {
            buffer,
            origin: Some(origin),
        }
    }

    /// The stripe this buffer must be returned to, if it came from a striped pool.
    #[must_use]
    pub fn origin(&self) -> Option<StripeTag> {
        self.origin
    }

    /// Extracts the stripe index this buffer belongs to in the pool `pool` with `stripe_count`
    /// stripes.
    ///
    /// # Panics
    ///
    /// Panics if the buffer did not come from a stripe of `pool`.
    pub(crate) fn expect_stripe_of(&self, pool: PoolId, stripe_count: usize) -> usize {
        let Some(origin) = self.origin else {
            panic!(
                "buffer {} has no stripe tag and cannot be released into a striped pool",
                self.buffer.id
            );
        };

        assert!(
            origin.pool == pool,
            "buffer {} belongs to pool {:?}, not to {pool:?}",
            self.buffer.id,
            origin.pool
        );

        assert!(
            origin.stripe < stripe_count,
            "buffer {} claims stripe {} but the pool only has {stripe_count} stripes",
            self.buffer.id,
            origin.stripe
        );

        origin.stripe
    }

    /// Unwraps a buffer that is about to go into a stripe-less pool.
    ///
    /// # Panics
    ///
    /// Panics if the buffer carries a stripe tag.
    pub(crate) fn expect_untagged(self, pool_kind: &str) -> ScratchBuffer {
        assert!(
            self.origin.is_none(),
            "buffer {} came from stripe {:?} and cannot be released into a {pool_kind}",
            self.buffer.id,
            self.origin
        );

        self.buffer
    }

    pub(crate) fn into_buffer(self) -> ScratchBuffer {
        self.buffer
    }
}

impl Deref for Pooled {
    type Target = ScratchBuffer;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for Pooled {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}
