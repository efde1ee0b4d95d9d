//! Reclamation instrumentation guard.
//!
//! `PoisonGuard` follows the same epoch schedule as `EpochGuard`, but instead
//! of freeing a reclaimed node it overwrites every byte with [`POISON_BYTE`]
//! and leaks the allocation. Any operation that touches a node after it was
//! reclaimed then reads poison rather than stale data: debug builds trip the
//! node canary and release builds surface values that were never enqueued.
//!
//! The leaked memory makes this guard unsuitable outside of tests.

use std::mem;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch as epoch;
use msqueue_core::guard::Guard;
use tracing::trace;

pub const POISON_BYTE: u8 = 0xDE;

/// Epoch-scheduled guard that poisons nodes instead of freeing them.
#[derive(Debug, Default)]
pub struct PoisonGuard {
    retired: AtomicUsize,
    // Shared with the deferred closures, which may outlive the queue.
    reclaimed: Arc<AtomicUsize>,
}

impl PoisonGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes handed to `defer_destroy`.
    pub fn retired(&self) -> usize {
        self.retired.load(Ordering::Acquire)
    }

    /// Number of retired nodes the epoch collector has reclaimed (poisoned).
    pub fn reclaimed(&self) -> usize {
        self.reclaimed.load(Ordering::Acquire)
    }
}

impl Guard for PoisonGuard {
    type ReadGuard = epoch::Guard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, _dealloc: unsafe fn(*mut N)) {
        self.retired.fetch_add(1, Ordering::Relaxed);
        let reclaimed = Arc::clone(&self.reclaimed);

        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                ptr::write_bytes(node as *mut u8, POISON_BYTE, mem::size_of::<N>());
                reclaimed.fetch_add(1, Ordering::Release);
                trace!(node = ?node, "poisoned reclaimed node");
            });
        }
    }
}
