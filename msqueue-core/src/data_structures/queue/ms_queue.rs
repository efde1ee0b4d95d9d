use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use crate::data_structures::ConcurrentQueue;
use crate::data_structures::internal::{NodePtr, QueueNode};
use crate::guard::Guard;

///
/// Unbounded lock-free FIFO queue based on Michael & Scott's paper
/// 'Simple, Fast, and Practical Non-Blocking and Blocking Concurrent Queue Algorithms'.
///
/// Node reclamation is delegated to the guard `G`: a node is retired once `head`
/// has been swung past it and freed when the guard says no reader can still
/// hold it.
///
// =============================================================================
// QUEUE INVARIANTS
// =============================================================================
//
// ┌──────────┐    ┌──────┐    ┌──────┐    ┌──────┐
// │ sentinel │───►│  10  │───►│  20  │───►│  30  │───► NULL
// └──────────┘    └──────┘    └──────┘    └──────┘
//      ▲                                      ▲
//     head                                   tail
//
// 1. head and tail are never null.
// 2. head is always the sentinel: the first unread value lives in head.next.
// 3. tail is reachable from head and is either the last node or the one
//    before it (it lags by at most one node).
// 4. head never passes tail: a dequeue that sees head == tail with a
//    non-null head.next first helps tail forward.
// 5. A node's next goes from NULL to its successor exactly once.
//
// =============================================================================
// ENQUEUE (link, then swing)
// =============================================================================
//
// Step 1 - Link: CAS tail.next from NULL to the new node.
//
//          tail
//           ▼
//          [30] ───► NULL          becomes       [30] ───► [40]
//
//          The linking CAS is the linearization point of the enqueue.
//
// Step 2 - Swing: CAS Queue.tail from [30] to [40]. Best-effort only; if it
//          fails, some other thread has already moved tail forward.
//
// LAGGING TAIL: between step 1 and step 2 another thread may observe
// tail.next != NULL. It never waits for the original enqueuer: it swings tail
// forward itself and retries.
//
// =============================================================================
// DEQUEUE (swing head, retire old sentinel)
// =============================================================================
//
// Before:  head ──► [S] ───► [10] ───► [20]
// After:   head ──────────► [10] ───► [20]      [S] retired to the guard
//
// The value of [10] is moved out only by the thread whose head CAS succeeded.
// [10] is now the sentinel; its value slot is logically empty. Every operation
// holds a pinned read guard, so [S] and [10] stay valid for any thread that
// loaded them before the swing.
//
// =============================================================================
pub struct MsQueue<T, G: Guard> {
    head: CachePadded<AtomicPtr<QueueNode<T>>>,
    tail: CachePadded<AtomicPtr<QueueNode<T>>>,
    /// Shared guard instance for deferred destruction of retired sentinels.
    guard: G,
    _marker: PhantomData<T>,
}

// Values are moved between threads, never shared, so `T: Send` is enough.
unsafe impl<T: Send, G: Guard> Send for MsQueue<T, G> {}
unsafe impl<T: Send, G: Guard> Sync for MsQueue<T, G> {}

impl<T, G> MsQueue<T, G>
where
    G: Guard,
{
    /// Create an empty queue holding a single sentinel node.
    pub fn new() -> Self {
        let sentinel = QueueNode::alloc_sentinel();
        MsQueue {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            guard: G::default(),
            _marker: PhantomData,
        }
    }

    /// Get the shared guard instance for this queue.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    /// Append `value` at the tail of the queue.
    ///
    pub fn enqueue(&self, value: T) {
        let new_node = QueueNode::alloc(value);
        let _guard = G::pin();

        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { QueueNode::from_ptr(tail) }.get_next();

            // Are tail and next consistent?
            //
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }

            if next.is_null() {
                // tail is the last node, try to link the new node after it.
                //
                let linked = unsafe { QueueNode::from_ptr(tail) }.cas_next(next, new_node);
                if linked.is_ok() {
                    // Enqueue is done. Try to swing tail to the inserted node;
                    // failure means someone already helped.
                    //
                    let _ = self.cas_tail(tail, new_node);
                    return;
                }
            } else {
                // tail is lagging behind, help the other enqueuer finish.
                //
                trace!("enqueue found a lagging tail, swinging it forward");
                let _ = self.cas_tail(tail, next);
            }
        }
    }

    /// Remove and return the value at the head of the queue.
    ///
    /// Returns `None` if the queue is empty.
    ///
    pub fn dequeue(&self) -> Option<T> {
        let _guard = G::pin();

        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { QueueNode::from_ptr(head) }.get_next();

            // Are head, tail and next consistent?
            //
            if head != self.head.load(Ordering::Acquire) {
                continue;
            }

            if head == tail {
                if next.is_null() {
                    return None;
                }

                // tail is falling behind a node that is already linked.
                //
                trace!("dequeue found a lagging tail, swinging it forward");
                let _ = self.cas_tail(tail, next);
                continue;
            }

            // head != tail implies head.next is linked (invariant 3).
            //
            debug_assert!(!next.is_null());

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                unsafe {
                    // Only the winner of the head swing takes the value. `next`
                    // cannot be reclaimed before `_guard` is dropped.
                    //
                    let value = QueueNode::from_ptr(next).take_value();
                    self.guard.defer_destroy(head, QueueNode::dealloc_ptr);
                    return Some(value);
                }
            }
        }
    }

    /// Return a copy of the value at the head of the queue without removing it.
    ///
    /// Goes through the same pin and consistency check as `dequeue`, so it never
    /// reads from a node that may already have been reclaimed.
    ///
    pub fn peek(&self) -> Option<T>
    where
        T: Copy,
    {
        let _guard = G::pin();

        loop {
            let head = self.head.load(Ordering::Acquire);
            let next = unsafe { QueueNode::from_ptr(head) }.get_next();

            if head != self.head.load(Ordering::Acquire) {
                continue;
            }

            if next.is_null() {
                return None;
            }

            // A racing dequeue may be moving this value out right now; for a
            // `Copy` payload both sides only read the same immutable bytes.
            //
            return Some(unsafe { QueueNode::from_ptr(next).copy_value() });
        }
    }

    /// Check whether the queue was empty at the instant it was observed.
    pub fn is_empty(&self) -> bool {
        let _guard = G::pin();
        let head = self.head.load(Ordering::Acquire);
        unsafe { QueueNode::from_ptr(head) }.get_next().is_null()
    }

    #[inline]
    fn cas_tail(
        &self,
        expected: NodePtr<T>,
        new: NodePtr<T>,
    ) -> Result<NodePtr<T>, NodePtr<T>> {
        self.tail
            .compare_exchange(expected, new, Ordering::Release, Ordering::Relaxed)
    }
}

impl<T, G> ConcurrentQueue<T> for MsQueue<T, G>
where
    G: Guard,
{
    fn enqueue(&self, value: T) {
        MsQueue::enqueue(self, value)
    }

    fn dequeue(&self) -> Option<T> {
        MsQueue::dequeue(self)
    }

    fn peek(&self) -> Option<T>
    where
        T: Copy,
    {
        MsQueue::peek(self)
    }

    fn is_empty(&self) -> bool {
        MsQueue::is_empty(self)
    }
}

impl<T, G> Default for MsQueue<T, G>
where
    G: Guard,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G: Guard> fmt::Debug for MsQueue<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("MsQueue { .. }")
    }
}

impl<T, G: Guard> Drop for MsQueue<T, G> {
    fn drop(&mut self) {
        // Free the chain from the sentinel on. Retired nodes belong to the guard,
        // which is dropped right after this.
        //
        let sentinel = *self.head.get_mut();
        let mut released = 0usize;

        unsafe {
            let mut curr = QueueNode::from_ptr(sentinel).get_next();
            QueueNode::dealloc_ptr(sentinel);

            while !curr.is_null() {
                let next = QueueNode::from_ptr(curr).get_next();
                QueueNode::drop_value(curr);
                QueueNode::dealloc_ptr(curr);
                released += 1;
                curr = next;
            }
        }

        if released > 0 {
            debug!(values = released, "dropped values still queued");
        }
    }
}

// ============================================================================
// Tests - Unique to MsQueue
// ============================================================================
// Note: Common tests are in tests/queue_core_tests.rs

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DeferredGuard;
    use std::ptr;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    type TestQueue<T> = MsQueue<T, DeferredGuard>;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_enqueue_helps_lagging_tail() {
        let queue: TestQueue<u64> = MsQueue::new();
        queue.enqueue(1);

        // Link a node after tail without swinging tail, as an enqueuer that
        // stalled between its two CAS steps would.
        let tail = queue.tail.load(Ordering::Acquire);
        let stalled = QueueNode::alloc(2);
        unsafe {
            let linked = QueueNode::from_ptr(tail).cas_next(ptr::null_mut(), stalled);
            assert!(linked.is_ok());
        }
        assert_eq!(queue.tail.load(Ordering::Acquire), tail);

        queue.enqueue(3);

        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_dequeue_helps_lagging_tail() {
        let queue: TestQueue<u64> = MsQueue::new();

        // head == tail == sentinel, but sentinel.next is already linked.
        let sentinel = queue.head.load(Ordering::Acquire);
        let stalled = QueueNode::alloc(42);
        unsafe {
            let linked = QueueNode::from_ptr(sentinel).cas_next(ptr::null_mut(), stalled);
            assert!(linked.is_ok());
        }

        assert!(!queue.is_empty());
        assert_eq!(queue.peek(), Some(42));
        assert_eq!(queue.dequeue(), Some(42));

        // tail was helped forward before head moved, so head never passed it.
        assert_eq!(queue.head.load(Ordering::Acquire), stalled);
        assert_eq!(queue.tail.load(Ordering::Acquire), stalled);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_each_dequeue_retires_one_node() {
        let queue: TestQueue<u64> = MsQueue::new();

        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.guard().retired_count(), 0);

        for i in 0..100 {
            queue.enqueue(i);
        }
        for _ in 0..60 {
            assert!(queue.dequeue().is_some());
        }
        assert_eq!(queue.guard().retired_count(), 60);

        // peek never retires anything.
        assert_eq!(queue.peek(), Some(60));
        assert_eq!(queue.guard().retired_count(), 60);
    }

    #[test]
    fn test_drop_releases_queued_values() {
        let drops = Arc::new(AtomicUsize::new(0));

        {
            let queue: TestQueue<DropCounter> = MsQueue::new();
            for _ in 0..10 {
                queue.enqueue(DropCounter(Arc::clone(&drops)));
            }

            // Dequeued values are owned by the caller and dropped here.
            for _ in 0..4 {
                drop(queue.dequeue());
            }
            assert_eq!(drops.load(Ordering::Relaxed), 4);
        }

        // Remaining values dropped exactly once, retired nodes never drop values.
        assert_eq!(drops.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_non_copy_payload() {
        let queue: TestQueue<String> = MsQueue::new();
        queue.enqueue("first".to_string());
        queue.enqueue("second".to_string());

        assert_eq!(queue.dequeue().as_deref(), Some("first"));
        assert_eq!(queue.dequeue().as_deref(), Some("second"));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_concurrent_drop_counting() {
        let drops = Arc::new(AtomicUsize::new(0));
        let queue: Arc<TestQueue<DropCounter>> = Arc::new(MsQueue::new());
        let num_threads = 4;
        let per_thread = 1000;

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let drops = Arc::clone(&drops);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        queue.enqueue(DropCounter(Arc::clone(&drops)));
                        if i % 2 == 0 {
                            drop(queue.dequeue());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        drop(queue);
        assert_eq!(drops.load(Ordering::Relaxed), num_threads * per_thread);
    }

    #[test]
    fn test_debug_does_not_traverse() {
        let queue: TestQueue<u64> = MsQueue::new();
        queue.enqueue(1);
        assert_eq!(format!("{:?}", queue), "MsQueue { .. }");
    }
}
