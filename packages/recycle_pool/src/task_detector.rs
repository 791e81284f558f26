use std::fmt;
use std::sync::Arc;

use tokio::task;

/// Decides whether the current caller is a lightweight async task or a conventional OS thread.
///
/// The predicate is chosen once, when the detector is created, and then evaluated on every
/// pool operation. It must be cheap.
///
/// # Example
///
/// ```rust
/// use recycle_pool::TaskDetector;
///
/// // Treat every caller as an async task.
/// let detector = TaskDetector::from_fn(|| true);
/// assert!(detector.is_lightweight_task());
/// ```
#[derive(Clone)]
pub struct TaskDetector {
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl TaskDetector {
    /// Uses a custom predicate.
    #[must_use]
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// The detector suitable for the current process.
    ///
    /// Code running inside a task spawned on a Tokio runtime is considered to be a lightweight
    /// task, as it shares its carrier thread with any number of other tasks. Everything else is
    /// an OS thread, including a thread that merely drives a future via `Runtime::block_on()`.
    ///
    /// Closures passed to `spawn_blocking()` run as runtime tasks, so they are detected as
    /// lightweight tasks even though each one owns its blocking-pool thread for its duration.
    /// Their buffers are served by the striped pool, which is correct but forgoes the
    /// thread-local fast path.
    #[must_use]
    pub fn resolve() -> Self {
        Self::from_fn(|| task::try_id().is_some())
    }

    /// A detector that never reports a lightweight task, for processes that do not use any.
    #[must_use]
    pub fn os_threads_only() -> Self {
        Self::from_fn(|| false)
    }

    /// Whether the current caller is a lightweight task.
    #[must_use]
    pub fn is_lightweight_task(&self) -> bool {
        (self.predicate)()
    }
}

impl Default for TaskDetector {
    fn default() -> Self {
        Self::resolve()
    }
}

impl fmt::Debug for TaskDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDetector").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(TaskDetector: Send, Sync, Clone, Debug);

    #[test]
    fn plain_thread_is_not_a_task() {
        assert!(!TaskDetector::resolve().is_lightweight_task());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn runtime_task_is_a_task() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .build()
            .unwrap();

        let detected = runtime
            .block_on(runtime.spawn(async { TaskDetector::resolve().is_lightweight_task() }))
            .unwrap();

        assert!(detected);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn block_on_caller_is_not_a_task() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        // The runtime context is entered but no task is being polled.
        let detected = runtime.block_on(async { TaskDetector::resolve().is_lightweight_task() });

        assert!(!detected);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn blocking_closure_is_a_task() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let detected = runtime
            .block_on(runtime.spawn_blocking(|| TaskDetector::resolve().is_lightweight_task()))
            .unwrap();

        assert!(detected);
    }

    #[test]
    fn os_threads_only_never_detects() {
        assert!(!TaskDetector::os_threads_only().is_lightweight_task());
    }

    #[test]
    fn custom_predicate_is_used() {
        assert!(TaskDetector::from_fn(|| true).is_lightweight_task());
    }
}
