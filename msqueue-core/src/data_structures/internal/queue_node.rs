use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

pub(crate) type NodePtr<T> = *mut QueueNode<T>;

// Written into every live node in debug builds. A reclaimed node that has been
// poisoned (or reused) no longer carries it, so dereferencing it trips the
// assertion in `QueueNode::from_ptr`.
#[cfg(debug_assertions)]
pub(crate) const NODE_CANARY: usize = 0x5AFE_C0DE_5AFE_C0DE_u64 as usize;

// =============================================================================
// NODE LIFECYCLE
// =============================================================================
//
// ┌──────────┐    ┌──────────┐    ┌──────────┐
// │ sentinel │───►│    A     │───►│    B     │───► NULL
// │ (no val) │    │  value   │    │  value   │
// └──────────┘    └──────────┘    └──────────┘
//      ▲                               ▲
//     head                            tail
//
// - `value` is written once, before the node is published by the enqueue CAS.
// - `next` goes from NULL to the successor exactly once.
// - A dequeue that swings head from sentinel to A moves A.value out; A becomes
//   the new sentinel and the old sentinel is retired to the guard.
// - Deallocation never drops `value`: it is either uninitialised (sentinel) or
//   has already been moved out. Values still queued are dropped by the queue.
//
// =============================================================================
pub(crate) struct QueueNode<T> {
    value: MaybeUninit<T>,
    next: AtomicPtr<QueueNode<T>>,
    #[cfg(debug_assertions)]
    canary: usize,
}

impl<T> QueueNode<T> {
    fn with_value(value: MaybeUninit<T>) -> Self {
        QueueNode {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
            #[cfg(debug_assertions)]
            canary: NODE_CANARY,
        }
    }

    /// Allocate a node carrying `value`.
    pub(crate) fn alloc(value: T) -> NodePtr<T> {
        Box::into_raw(Box::new(Self::with_value(MaybeUninit::new(value))))
    }

    /// Allocate a sentinel node; its value is never read.
    pub(crate) fn alloc_sentinel() -> NodePtr<T> {
        Box::into_raw(Box::new(Self::with_value(MaybeUninit::uninit())))
    }

    /// Borrow a node from a pointer loaded out of the queue.
    ///
    /// # Safety
    /// `ptr` must be non-null and protected by a pinned read guard (or owned).
    #[inline]
    pub(crate) unsafe fn from_ptr<'a>(ptr: NodePtr<T>) -> &'a Self {
        debug_assert!(!ptr.is_null(), "dereferencing a null queue node");
        let node = unsafe { &*ptr };
        #[cfg(debug_assertions)]
        assert_eq!(
            node.canary, NODE_CANARY,
            "queue node {:p} dereferenced after reclamation",
            ptr
        );
        node
    }

    // =========================================================================
    // Next pointer accessors
    // =========================================================================

    /// Load next pointer (Acquire ordering)
    #[inline]
    pub(crate) fn get_next(&self) -> NodePtr<T> {
        self.next.load(Ordering::Acquire)
    }

    /// Store the next pointer of `node` (Release ordering).
    ///
    /// Goes through the raw pointer and borrows only the `next` field: once the
    /// store lands, a reader may free `node` before this call returns.
    ///
    /// # Safety
    /// `node` must be live when called, with a single writer for `next`
    /// (e.g. under the tail lock).
    #[inline]
    pub(crate) unsafe fn store_next(node: NodePtr<T>, next: NodePtr<T>) {
        debug_assert!(!node.is_null(), "linking after a null queue node");
        unsafe { (*node).next.store(next, Ordering::Release) }
    }

    /// Link `new` after this node if it is still the last one (Release/Relaxed).
    #[inline]
    pub(crate) fn cas_next(
        &self,
        expected: NodePtr<T>,
        new: NodePtr<T>,
    ) -> Result<NodePtr<T>, NodePtr<T>> {
        self.next
            .compare_exchange(expected, new, Ordering::Release, Ordering::Relaxed)
    }

    // =========================================================================
    // Value access
    // =========================================================================

    /// Move the value out of the node.
    ///
    /// # Safety
    /// The node must carry an initialised value and the caller must be the
    /// only one to ever take it (the winner of the head-swing).
    #[inline]
    pub(crate) unsafe fn take_value(&self) -> T {
        unsafe { ptr::read(self.value.as_ptr()) }
    }

    /// Copy the value out of the node without taking ownership.
    ///
    /// # Safety
    /// The node must carry (or have carried) an initialised value.
    #[inline]
    pub(crate) unsafe fn copy_value(&self) -> T
    where
        T: Copy,
    {
        unsafe { ptr::read(self.value.as_ptr()) }
    }

    /// Drop the value in place.
    ///
    /// # Safety
    /// The node must carry an initialised value that was never taken.
    pub(crate) unsafe fn drop_value(ptr: NodePtr<T>) {
        unsafe { ptr::drop_in_place((*ptr).value.as_mut_ptr()) };
    }

    /// Deallocate a node without dropping its value.
    ///
    /// # Safety
    /// - The pointer must come from `alloc` or `alloc_sentinel`
    /// - Must only be called once
    /// - Node must not be accessed after this call
    pub(crate) unsafe fn dealloc_ptr(ptr: NodePtr<T>) {
        // MaybeUninit never drops its contents.
        unsafe { drop(Box::from_raw(ptr)) };
    }
}
