use std::time::Duration;

use msqueue_core::common_tests::queue_stress_tests::*;
use msqueue_core::common_tests::stress_harness::{StressConfig, StressError, run_stress};
use msqueue_core::{ConcurrentQueue, DeferredGuard, MsQueue, TwoLockQueue};
use rstest::rstest;
use serial_test::serial;
use tracing_subscriber::EnvFilter;

// Trait for type-level parametrization
trait TestQueue {
    type QueueType: ConcurrentQueue<u64> + Default + Send + Sync + 'static;
}

// Marker types for each queue
struct UseMsQueue;
struct UseTwoLockQueue;

impl TestQueue for UseMsQueue {
    type QueueType = MsQueue<u64, DeferredGuard>;
}

impl TestQueue for UseTwoLockQueue {
    type QueueType = TwoLockQueue<u64>;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_single_producer_single_consumer<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_single_producer_single_consumer::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_multi_producer_multi_consumer<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_multi_producer_multi_consumer::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_per_producer_fifo<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_per_producer_fifo::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_partial_drain<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_partial_drain::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue_seed_1(UseMsQueue, 1)]
#[case::ms_queue_seed_2(UseMsQueue, 0x5eed)]
#[case::ms_queue_seed_3(UseMsQueue, 0xdead_beef)]
#[case::two_lock_queue_seed_1(UseTwoLockQueue, 1)]
fn stress_randomized_interleavings<T: TestQueue>(#[case] _type: T, #[case] seed: u64) {
    init_tracing();
    test_randomized_interleavings::<T::QueueType>(seed);
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_peek_during_modifications<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_peek_during_modifications::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_memory_ordering<T: TestQueue>(#[case] _type: T) {
    test_memory_ordering::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_empty_queue_contention<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_empty_queue_contention::<T::QueueType>();
}

#[rstest]
#[serial(stress_tests)]
#[case::ms_queue(UseMsQueue)]
#[case::two_lock_queue(UseTwoLockQueue)]
fn stress_mixed_enqueue_dequeue<T: TestQueue>(#[case] _type: T) {
    init_tracing();
    test_mixed_enqueue_dequeue::<T::QueueType>();
}

#[test]
#[serial(stress_tests)]
fn stress_reports_timeout() {
    init_tracing();
    // Consumers wait for values that would take far longer than the deadline
    let config =
        StressConfig::new(1, 1, 50_000_000).with_timeout(Duration::from_millis(20));
    assert!(matches!(
        run_stress::<MsQueue<u64, DeferredGuard>>(&config),
        Err(StressError::Timeout { .. })
    ));
}
