use std::str::FromStr;

use derive_more::Display;
use tracing::debug;

use crate::{
    Error, HybridQueuePool, HybridStackPool, NoOpPool, Pooled, QueuePool, RecyclerPool, Result,
    StripeCount, StripedStackPool, TaskDetector, ThreadLocalPool,
};

/// The available pooling strategies.
///
/// The string form (via `Display` and `FromStr`) is the upper snake case name of the variant.
/// Parsing is case-insensitive and additionally accepts the aliases `CONCURRENT_DEQUEUE` and
/// `JCTOOLS` for [`Queue`][Self::Queue], `LOCK_FREE` for [`Stack`][Self::Stack],
/// `HYBRID_JCTOOLS` for [`HybridQueue`][Self::HybridQueue] and `HYBRID_LOCK_FREE` for
/// [`HybridStriped`][Self::HybridStriped].
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PoolStrategy {
    /// Always allocate a fresh buffer. See [`NoOpPool`].
    #[display("NO_OP")]
    NoOp,

    /// One cached buffer per OS thread. See [`ThreadLocalPool`].
    #[display("THREAD_LOCAL")]
    ThreadLocal,

    /// One shared lock-free queue. See [`QueuePool`].
    #[display("QUEUE")]
    Queue,

    /// One shared lock-free stack. A [`StripedStackPool`] with a single stripe, regardless of
    /// the requested stripe count.
    #[display("STACK")]
    Stack,

    /// Striped lock-free stacks. See [`StripedStackPool`].
    #[display("STRIPED")]
    Striped,

    /// Thread-local for OS threads, striped queues for async tasks. See [`HybridQueuePool`].
    #[display("HYBRID_QUEUE")]
    HybridQueue,

    /// Thread-local for OS threads, striped stacks for async tasks. See [`HybridStackPool`].
    #[default]
    #[display("HYBRID_STRIPED")]
    HybridStriped,
}

impl PoolStrategy {
    /// Every strategy, in order from simplest to most elaborate.
    pub const ALL: &'static [Self] = &[
        Self::NoOp,
        Self::ThreadLocal,
        Self::Queue,
        Self::Stack,
        Self::Striped,
        Self::HybridQueue,
        Self::HybridStriped,
    ];

    /// Whether pools of this strategy ever hand out a previously released buffer.
    #[must_use]
    pub fn recycles(self) -> bool {
        self != Self::NoOp
    }
}

impl FromStr for PoolStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NO_OP" => Ok(Self::NoOp),
            "THREAD_LOCAL" => Ok(Self::ThreadLocal),
            "QUEUE" | "CONCURRENT_DEQUEUE" | "JCTOOLS" => Ok(Self::Queue),
            "STACK" | "LOCK_FREE" => Ok(Self::Stack),
            "STRIPED" => Ok(Self::Striped),
            "HYBRID_QUEUE" | "HYBRID_JCTOOLS" => Ok(Self::HybridQueue),
            "HYBRID_STRIPED" | "HYBRID_LOCK_FREE" => Ok(Self::HybridStriped),
            _ => Err(Error::UnknownStrategy { name: s.to_string() }),
        }
    }
}

/// Configures and creates a pool.
///
/// # Example
///
/// ```rust
/// use recycle_pool::{PoolBuilder, PoolStrategy, RecyclerPool};
///
/// let pool = PoolBuilder::new()
///     .strategy("HYBRID_LOCK_FREE".parse().unwrap())
///     .stripe_count(16)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.strategy(), PoolStrategy::HybridStriped);
///
/// let pooled = pool.acquire();
/// pool.release(pooled);
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct PoolBuilder {
    strategy: PoolStrategy,
    stripe_count: Option<i32>,
    detector: Option<TaskDetector>,
}

impl PoolBuilder {
    /// Creates a builder with default settings: the hybrid striped strategy with one stripe per
    /// unit of hardware parallelism.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the pooling strategy.
    pub fn strategy(mut self, strategy: PoolStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Requests a number of stripes for the strategies that use them. Rounded up to the nearest
    /// power of two.
    ///
    /// Validated by [`build()`][Self::build] even for strategies that do not use stripes.
    pub fn stripe_count(mut self, requested: i32) -> Self {
        self.stripe_count = Some(requested);
        self
    }

    /// Overrides how the hybrid strategies tell async tasks from OS threads.
    ///
    /// Defaults to [`TaskDetector::resolve()`].
    pub fn task_detector(mut self, detector: TaskDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Creates the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested stripe count is not valid.
    pub fn build(self) -> Result<SelectedPool> {
        let stripes = match self.stripe_count {
            Some(requested) => StripeCount::new(requested)?,
            None => StripeCount::default(),
        };

        let detector = self.detector.unwrap_or_else(TaskDetector::resolve);

        debug!(strategy = %self.strategy, stripes = stripes.get(), "building pool");

        Ok(match self.strategy {
            PoolStrategy::NoOp => SelectedPool::NoOp(NoOpPool::new()),
            PoolStrategy::ThreadLocal => SelectedPool::ThreadLocal(ThreadLocalPool::new()),
            PoolStrategy::Queue => SelectedPool::Queue(QueuePool::new()),
            PoolStrategy::Stack => SelectedPool::Stack(StripedStackPool::new(StripeCount::one())),
            PoolStrategy::Striped => SelectedPool::Striped(StripedStackPool::new(stripes)),
            PoolStrategy::HybridQueue => {
                SelectedPool::HybridQueue(HybridQueuePool::new(stripes, detector))
            }
            PoolStrategy::HybridStriped => {
                SelectedPool::HybridStriped(HybridStackPool::new(stripes, detector))
            }
        })
    }
}

/// A pool of any strategy, as created by a [`PoolBuilder`].
#[derive(Debug)]
#[non_exhaustive]
pub enum SelectedPool {
    /// See [`PoolStrategy::NoOp`].
    NoOp(NoOpPool),

    /// See [`PoolStrategy::ThreadLocal`].
    ThreadLocal(ThreadLocalPool),

    /// See [`PoolStrategy::Queue`].
    Queue(QueuePool),

    /// See [`PoolStrategy::Stack`].
    Stack(StripedStackPool),

    /// See [`PoolStrategy::Striped`].
    Striped(StripedStackPool),

    /// See [`PoolStrategy::HybridQueue`].
    HybridQueue(HybridQueuePool),

    /// See [`PoolStrategy::HybridStriped`].
    HybridStriped(HybridStackPool),
}

impl SelectedPool {
    /// The strategy this pool implements.
    #[must_use]
    pub fn strategy(&self) -> PoolStrategy {
        match self {
            Self::NoOp(_) => PoolStrategy::NoOp,
            Self::ThreadLocal(_) => PoolStrategy::ThreadLocal,
            Self::Queue(_) => PoolStrategy::Queue,
            Self::Stack(_) => PoolStrategy::Stack,
            Self::Striped(_) => PoolStrategy::Striped,
            Self::HybridQueue(_) => PoolStrategy::HybridQueue,
            Self::HybridStriped(_) => PoolStrategy::HybridStriped,
        }
    }
}

impl RecyclerPool for SelectedPool {
    fn acquire(&self) -> Pooled {
        match self {
            Self::NoOp(pool) => pool.acquire(),
            Self::ThreadLocal(pool) => pool.acquire(),
            Self::Queue(pool) => pool.acquire(),
            Self::Stack(pool) => pool.acquire(),
            Self::Striped(pool) => pool.acquire(),
            Self::HybridQueue(pool) => pool.acquire(),
            Self::HybridStriped(pool) => pool.acquire(),
        }
    }

    fn release(&self, pooled: Pooled) {
        match self {
            Self::NoOp(pool) => pool.release(pooled),
            Self::ThreadLocal(pool) => pool.release(pooled),
            Self::Queue(pool) => pool.release(pooled),
            Self::Stack(pool) => pool.release(pooled),
            Self::Striped(pool) => pool.release(pooled),
            Self::HybridQueue(pool) => pool.release(pooled),
            Self::HybridStriped(pool) => pool.release(pooled),
        }
    }
}
