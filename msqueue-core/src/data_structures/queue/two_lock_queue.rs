use std::fmt;
use std::marker::PhantomData;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use tracing::debug;

use crate::data_structures::ConcurrentQueue;
use crate::data_structures::internal::{NodePtr, QueueNode};

/// Unbounded FIFO queue with separate head and tail locks, the blocking
/// companion algorithm from the same Michael & Scott paper as `MsQueue`.
///
/// Enqueuers only contend on the tail lock and dequeuers only on the head
/// lock. The sentinel node keeps the two ends from ever touching the same
/// pointer, and the `next` link that crosses between them is atomic.
///
/// Because a retired sentinel can only be reached under the head lock, it is
/// freed immediately and no reclamation guard is needed.
///
pub struct TwoLockQueue<T> {
    head: CachePadded<Mutex<NodePtr<T>>>,
    tail: CachePadded<Mutex<NodePtr<T>>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for TwoLockQueue<T> {}
unsafe impl<T: Send> Sync for TwoLockQueue<T> {}

impl<T> TwoLockQueue<T> {
    /// Create an empty queue holding a single sentinel node.
    pub fn new() -> Self {
        let sentinel = QueueNode::alloc_sentinel();
        TwoLockQueue {
            head: CachePadded::new(Mutex::new(sentinel)),
            tail: CachePadded::new(Mutex::new(sentinel)),
            _marker: PhantomData,
        }
    }

    /// Append `value` at the tail of the queue.
    pub fn enqueue(&self, value: T) {
        let new_node = QueueNode::alloc(value);

        let mut tail = self.tail.lock();
        // Release store publishes the value to a dequeuer holding the head lock,
        // which may free the old tail as soon as it sees the link.
        //
        unsafe { QueueNode::store_next(*tail, new_node) };
        *tail = new_node;
    }

    /// Remove and return the value at the head of the queue, or `None` if it is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut head = self.head.lock();
        let sentinel = *head;
        let next = unsafe { QueueNode::from_ptr(sentinel) }.get_next();

        if next.is_null() {
            return None;
        }

        // `next` becomes the new sentinel; its value is moved out.
        //
        let value = unsafe { QueueNode::from_ptr(next).take_value() };
        *head = next;
        drop(head);

        // The enqueuer that linked `next` no longer touches `sentinel`, and
        // every other dequeuer will start from `next`.
        //
        unsafe { QueueNode::dealloc_ptr(sentinel) };
        Some(value)
    }

    /// Return a copy of the value at the head of the queue without removing it.
    pub fn peek(&self) -> Option<T>
    where
        T: Copy,
    {
        let head = self.head.lock();
        let next = unsafe { QueueNode::from_ptr(*head) }.get_next();

        if next.is_null() {
            None
        } else {
            Some(unsafe { QueueNode::from_ptr(next).copy_value() })
        }
    }

    /// Check whether the queue was empty at the instant it was observed.
    pub fn is_empty(&self) -> bool {
        let head = self.head.lock();
        unsafe { QueueNode::from_ptr(*head) }.get_next().is_null()
    }
}

impl<T> ConcurrentQueue<T> for TwoLockQueue<T> {
    fn enqueue(&self, value: T) {
        TwoLockQueue::enqueue(self, value)
    }

    fn dequeue(&self) -> Option<T> {
        TwoLockQueue::dequeue(self)
    }

    fn peek(&self) -> Option<T>
    where
        T: Copy,
    {
        TwoLockQueue::peek(self)
    }

    fn is_empty(&self) -> bool {
        TwoLockQueue::is_empty(self)
    }
}

impl<T> Default for TwoLockQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TwoLockQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("TwoLockQueue { .. }")
    }
}

impl<T> Drop for TwoLockQueue<T> {
    fn drop(&mut self) {
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
