use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::Ordering;

use crossbeam::epoch::{self, Atomic, Owned};

use crate::ScratchBuffer;

/// A free buffer linked into a stripe. Never leaves the stripe that created it.
pub(crate) struct Node {
    buffer: ManuallyDrop<ScratchBuffer>,
    next: Atomic<Node>,
}

/// One independently synchronized LIFO stack of free buffers (a Treiber stack).
///
/// The head is the only mutable shared state and is only ever changed by compare-and-swap.
/// Popped nodes are reclaimed via epoch-based reclamation, so a concurrent popper that still
/// holds a pointer to a popped node can safely read its `next` link, and a node address can
/// never be recycled while somebody might still compare against it.
pub(crate) struct Stripe {
    head: Atomic<Node>,
}

impl Stripe {
    pub(crate) fn new() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// Pushes a buffer onto the stack.
    ///
    /// Returns the number of compare-and-swap attempts that lost a race before the push
    /// succeeded.
    pub(crate) fn push(&self, buffer: ScratchBuffer) -> u32 {
        let mut node = Owned::new(Node {
            buffer: ManuallyDrop::new(buffer),
            next: Atomic::null(),
        });

        let guard = epoch::pin();
        let mut retries: u32 = 0;
        let mut head = self.head.load(Ordering::Relaxed, &guard);

        loop {
            node.next.store(head, Ordering::Relaxed);

            // Release on success publishes the node contents to whoever pops it.
            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => return retries,
                Err(e) => {
                    // Somebody else won the race. Their head is our new expectation.
                    head = e.current;
                    node = e.new;
                    retries = retries.saturating_add(1);
                }
            }
        }
    }

    /// Pops a buffer from the stack, if there is one.
    ///
    /// Also returns the number of compare-and-swap attempts that lost a race.
    pub(crate) fn pop(&self) -> (Option<ScratchBuffer>, u32) {
        let guard = epoch::pin();
        let mut retries: u32 = 0;
        let mut head = self.head.load(Ordering::Acquire, &guard);

        loop {
            // SAFETY: The guard keeps any node we observed alive until we unpin, even if another
            // thread pops and retires it in the meantime.
            let Some(head_ref) = (unsafe { head.as_ref() }) else {
                return (None, retries);
            };

            let next = head_ref.next.load(Ordering::Relaxed, &guard);

            match self
                .head
                .compare_exchange(head, next, Ordering::Acquire, Ordering::Acquire, &guard)
            {
                Ok(_) => {
                    // SAFETY: We won the race for this node, so nobody else will ever read the
                    // buffer out of it. The buffer is in a ManuallyDrop, so destroying the node
                    // later will not drop the buffer a second time.
                    let buffer = unsafe { ManuallyDrop::into_inner(ptr::read(&head_ref.buffer)) };

                    // SAFETY: The node is unlinked from the stack and the buffer has been moved
                    // out; it is destroyed once no pinned thread can still observe it.
                    unsafe {
                        guard.defer_destroy(head);
                    }

                    return (Some(buffer), retries);
                }
                Err(e) => {
                    head = e.current;
                    retries = retries.saturating_add(1);
                }
            }
        }
    }

    /// Counts the buffers in the stack.
    ///
    /// Advisory only if there are concurrent operations.
    pub(crate) fn len(&self) -> usize {
        let guard = epoch::pin();
        let mut count: usize = 0;
        let mut current = self.head.load(Ordering::Acquire, &guard);

        // SAFETY: The guard keeps every node we walk over alive.
        while let Some(node) = unsafe { current.as_ref() } {
            count = count.saturating_add(1);
            current = node.next.load(Ordering::Acquire, &guard);
        }

        count
    }

    /// Whether the stripe has no buffer in it.
    pub(crate) fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }
}

impl Drop for Stripe {
    fn drop(&mut self) {
        while let (Some(buffer), _) = self.pop() {
            drop(buffer);
        }
    }
}

impl fmt::Debug for Stripe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stripe")
            .field("len", &self.len())
            .finish()
    }
}
