#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Recycling pools of scratch buffers for high-throughput serializers.
//!
//! An encoder typically needs some transient working memory for every value it writes. Allocating
//! that memory from scratch for every operation is wasteful, so the encoder instead borrows a
//! [`ScratchBuffer`] from a pool, uses it and hands it back:
//!
//! ```rust
//! use std::io::Write;
//!
//! use recycle_pool::{PoolBuilder, PoolStrategy, RecyclerPool};
//!
//! let pool = PoolBuilder::new()
//!     .strategy(PoolStrategy::Striped)
//!     .stripe_count(4)
//!     .build()
//!     .unwrap();
//!
//! let written = pool.with_pooled(|buffer| {
//!     buffer.write_all(b"{\"answer\":42}").unwrap();
//!     buffer.len()
//! });
//!
//! assert_eq!(written, 13);
//! ```
//!
//! # Callers from two worlds
//!
//! The pools must serve two kinds of callers without becoming a point of contention:
//!
//! * Conventional OS threads, which have long-lived affinity to themselves. A single cached
//!   buffer per thread ([`ThreadLocalPool`]) is perfect for them.
//! * Lightweight async tasks multiplexed onto a small set of carrier threads. Any number of tasks
//!   may be mid-operation on the same carrier, so a single per-thread slot is not enough. These
//!   are served by a [`StripedStackPool`] - a set of independent lock-free stacks selected by
//!   hashing the identity of the calling thread.
//!
//! The [`HybridDispatcher`] decides per call which of the two a caller belongs to, using an
//! injected [`TaskDetector`].
//!
//! # Strategies
//!
//! | Strategy | Type | Notes |
//! |---|---|---|
//! | `NO_OP` | [`NoOpPool`] | Allocates fresh buffers every time. Baseline. |
//! | `THREAD_LOCAL` | [`ThreadLocalPool`] | One buffer per OS thread. |
//! | `QUEUE` | [`QueuePool`] | One shared lock-free queue. |
//! | `STACK` | [`StripedStackPool`] | One shared lock-free stack (a single stripe). |
//! | `STRIPED` | [`StripedStackPool`] | Lock-free stacks, one per stripe. |
//! | `HYBRID_QUEUE` | [`HybridDispatcher<StripedQueuePool>`] | Thread-local or striped queues. |
//! | `HYBRID_STRIPED` | [`HybridDispatcher<StripedStackPool>`] | Thread-local or striped stacks. |
//!
//! Use [`PoolBuilder`] to select a strategy at runtime.
//!
//! # Stripe routing
//!
//! Buffers obtained from a striped pool remember the stripe they came from (see [`StripeTag`])
//! and are always returned to that stripe, even if the releasing task has since migrated to a
//! different carrier thread. Releasing a buffer into a pool that did not produce it is a
//! programming error and panics.

mod buffer;
mod error;
mod hybrid;
mod metrics;
mod no_op_pool;
mod pool;
mod probe;
mod queue_pool;
mod registry;
mod stripe;
mod stripe_count;
mod striped_queue_pool;
mod striped_stack_pool;
mod task_detector;
mod thread_local_pool;

pub use buffer::*;
pub use error::*;
pub use hybrid::*;
pub use no_op_pool::*;
pub use pool::*;
pub use probe::*;
pub use queue_pool::*;
pub use registry::*;
pub(crate) use stripe::*;
pub use stripe_count::*;
pub use striped_queue_pool::*;
pub use striped_stack_pool::*;
pub use task_detector::*;
pub use thread_local_pool::*;
