//! Data structures for concurrent queues.
//!
//! # Organization
//!
//! - [`queue`] - Michael & Scott queues (lock-free `MsQueue`, `TwoLockQueue`)
//! - [`concurrent_queue`] - The `ConcurrentQueue` trait both queues implement
//! - `internal` - Node layout shared by the queues (pub(crate))

pub mod concurrent_queue;
pub(crate) mod internal;
pub mod queue;

pub use concurrent_queue::ConcurrentQueue;
pub use queue::{MsQueue, TwoLockQueue};
