//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! This module provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation.
//!
//! # Design
//!
//! `EpochGuard` is a zero-sized type that schedules destruction using the global
//! epoch collector. Queues parameterized with `EpochGuard` get epoch-based
//! memory reclamation:
//!
//! ```text
//! MsQueue<u64, EpochGuard>
//!     │
//!     ├── every enqueue/dequeue/peek pins the current thread
//!     └── retired sentinels are freed once no pinned thread can reach them
//! ```
//!
//! # Example
//!
//! ```rust
//! use msqueue_core::MsQueue;
//! use msqueue_crossbeam::EpochGuard;
//!
//! let queue: MsQueue<u64, EpochGuard> = MsQueue::new();
//! queue.enqueue(42);
//! queue.enqueue(17);
//!
//! assert_eq!(queue.peek(), Some(42));
//! assert_eq!(queue.dequeue(), Some(42));
//! assert_eq!(queue.dequeue(), Some(17));
//! assert_eq!(queue.dequeue(), None);
//! ```

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use msqueue_core::guard::Guard;

/// Epoch-based memory reclamation guard.
///
/// Nodes are not freed until all threads have advanced past the epoch in
/// which they were retired. That also rules out ABA on `head` and `tail`:
/// an address cannot be handed out again while any thread that loaded it is
/// still pinned.
///
/// When `defer_destroy` is called, it:
/// 1. Pins the current thread to the current epoch
/// 2. Schedules the destruction to run after all threads have advanced
/// 3. Unpins (the destruction is managed globally)
///
/// # Performance
///
/// - **Pin overhead**: Very low (thread-local check)
/// - **Reclamation**: Batched, amortized O(1) per node
/// - **Memory**: May accumulate while some thread stays pinned
///
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochGuard {
    // Zero-sized - all state is in the global epoch collector
}

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard {}
    }
}

impl Guard for EpochGuard {
    /// A pinned crossbeam guard; the thread stays pinned while it lives.
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }
}
