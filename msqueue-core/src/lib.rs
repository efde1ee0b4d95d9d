pub mod common_tests;
pub mod data_structures;
pub mod guard;
pub mod preemptive_synchronization;

// Re-export the public surface for convenience
pub use data_structures::{ConcurrentQueue, MsQueue, TwoLockQueue};
pub use guard::{DeferredGuard, Guard};
pub use preemptive_synchronization::CountdownEvent;
