//! Deferred guard implementation for testing.
//!
//! `DeferredGuard` keeps every retired node alive until the guard itself is
//! dropped, which for a queue means until the queue is dropped.

#[cfg(debug_assertions)]
use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;

use super::Guard;

/// A simple guard that defers all node destruction until the guard is dropped.
///
/// Nothing is ever freed while the queue is alive, so no reader can observe a
/// reclaimed node. Memory grows with the number of dequeues, which makes this
/// guard unsuitable for long-running queues.
///
/// In debug builds every retired address is recorded, and retiring the same
/// node twice panics. A double retirement means two dequeues swung `head` past
/// the same node.
///
pub struct DeferredGuard {
    deferred: Mutex<Vec<DeferredNode>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct DeferredNode {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// Safety: the pointer is only dereferenced by `dealloc` when the guard drops,
// at which point no other thread can hold the guard.
unsafe impl Send for DeferredNode {}

impl DeferredGuard {
    /// Create a new deferred guard.
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of nodes retired so far and waiting for the guard to drop.
    pub fn retired_count(&self) -> usize {
        self.deferred.lock().len()
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let nodes = self.deferred.get_mut();
        let count = nodes.len();

        for node in nodes.drain(..) {
            unsafe {
                (node.dealloc)(node.ptr);
            }
        }

        if count > 0 {
            debug!(nodes = count, "deferred guard released retired nodes");
        }
    }
}

impl Guard for DeferredGuard {
    /// Protection is provided by the stored guard, so pinning is a no-op.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let addr = node as usize;
            if !self.seen.lock().insert(addr) {
                panic!("node {:#x} retired twice", addr);
            }
        }

        let node = DeferredNode {
            ptr: node as *mut (),
            dealloc: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc)
            },
        };
        self.deferred.lock().push(node);
    }
}
