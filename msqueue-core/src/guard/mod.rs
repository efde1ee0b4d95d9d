//! Guard trait for memory reclamation strategies.
//!
//! Queues in this crate never free a node inline. Once a dequeue swings `head`
//! past a node, the node is handed to the queue's `Guard`, which decides when
//! no concurrent operation can still be dereferencing it.
//!
//! # Design
//!
//! ```text
//! MsQueue<T, G: Guard>
//!     │
//!     ├── MsQueue<T, EpochGuard>      (production, msqueue-crossbeam)
//!     ├── MsQueue<T, PoisonGuard>     (reclamation instrumentation, msqueue-crossbeam)
//!     └── MsQueue<T, DeferredGuard>   (testing)
//! ```
//!
//! Every operation pins a read guard with `G::pin()` before loading any node
//! pointer and keeps it until it is done with every node it loaded. A node
//! retired through `defer_destroy` must stay valid for every reader pinned at
//! the time it was retired.

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// # Safety Contract
///
/// Implementations must ensure that nodes passed to `defer_destroy` are not
/// freed (or otherwise invalidated) while any read guard obtained from `pin`
/// before the call is still alive.
///
/// Guards are stored in queues and must be `Send + Sync`. Thread pinning
/// happens per-operation, not when the guard is created.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards this is a pinned `crossbeam_epoch::Guard`. For
    /// deferred guards it is `()` since nothing is freed before the queue drops.
    ///
    type ReadGuard: Sized;

    /// Pin an active read guard.
    ///
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `node` must be a valid pointer previously allocated by the queue
    /// - `node` must be unlinked (not reachable from the queue's `head`)
    /// - `node` must be retired exactly once
    /// - `dealloc` must be the correct deallocation function for `node`
    ///
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));
}
