//! Michael & Scott queues.

pub mod ms_queue;
pub mod two_lock_queue;

pub use ms_queue::MsQueue;
pub use two_lock_queue::TwoLockQueue;
