/// Operations shared by every queue in this crate.
///
/// Reusable test suites, the stress harness and the benchmarks are all
/// written against this trait, so the lock-free and two-lock queues are
/// exercised by exactly the same scenarios.
///
pub trait ConcurrentQueue<T> {
    /// Append `value` at the tail. Never fails; the queue is unbounded.
    fn enqueue(&self, value: T);

    /// Remove and return the value at the head, or `None` if the queue is empty.
    fn dequeue(&self) -> Option<T>;

    /// Return a copy of the value at the head without removing it.
    fn peek(&self) -> Option<T>
    where
        T: Copy;

    /// Check whether the queue was empty at the instant it was observed.
    fn is_empty(&self) -> bool;
}
