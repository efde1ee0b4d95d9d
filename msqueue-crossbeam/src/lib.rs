//! Crossbeam-based reclamation guards for msqueue queues.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation, and `PoisonGuard`, which
//! follows the same schedule but poisons reclaimed nodes so that any
//! use-after-reclamation shows up in tests.
//!
//! # Usage
//!
//! ```
//! use msqueue_core::MsQueue;
//! use msqueue_crossbeam::EpochGuard;
//!
//! let queue: MsQueue<String, EpochGuard> = MsQueue::new();
//! queue.enqueue("hello".to_string());
//! assert_eq!(queue.dequeue().as_deref(), Some("hello"));
//! ```

pub mod epoch_guard;
pub mod poison_guard;

pub use epoch_guard::EpochGuard;
pub use poison_guard::{POISON_BYTE, PoisonGuard};

/// Lock-free queue with epoch-based reclamation.
pub type EpochQueue<T> = msqueue_core::MsQueue<T, EpochGuard>;
