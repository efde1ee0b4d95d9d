//! Producer/consumer stress harness shared by the queue test suites.
//!
//! Every value carries its producer index in the high 32 bits and a per-producer
//! sequence number in the low 32 bits. After a run, the histories collected by
//! the consumers are checked for loss, duplication, per-producer FIFO order and
//! values that were never enqueued (e.g. poisoned memory).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use crate::data_structures::ConcurrentQueue;
use crate::preemptive_synchronization::CountdownEvent;

const SEQUENCE_BITS: u32 = 32;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Pack a producer index and a sequence number into one queue value.
pub fn encode(producer: usize, seq: u64) -> u64 {
    ((producer as u64) << SEQUENCE_BITS) | (seq & SEQUENCE_MASK)
}

/// Inverse of [`encode`].
pub fn decode(value: u64) -> (usize, u64) {
    ((value >> SEQUENCE_BITS) as usize, value & SEQUENCE_MASK)
}

#[derive(Debug, Clone)]
pub struct StressConfig {
    pub producers: usize,
    pub consumers: usize,
    pub items_per_producer: u64,
    /// How long to wait for all workers before reporting a timeout.
    pub timeout: Duration,
    /// Seed for random yields and spins between operations. `None` runs flat out.
    pub jitter_seed: Option<u64>,
}

impl StressConfig {
    pub fn new(producers: usize, consumers: usize, items_per_producer: u64) -> Self {
        StressConfig {
            producers,
            consumers,
            items_per_producer,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_jitter(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn total_items(&self) -> u64 {
        self.producers as u64 * self.items_per_producer
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        StressConfig {
            producers: 4,
            consumers: 4,
            items_per_producer: 25_000,
            timeout: Duration::from_secs(60),
            jitter_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub dequeued: u64,
    /// Dequeue calls that found the queue empty.
    pub empty_polls: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StressError {
    #[error("value {value:#x} was dequeued more than once")]
    Duplicate { value: u64 },

    #[error("{missing} enqueued values were never dequeued")]
    Lost { missing: u64 },

    #[error("producer {producer} values observed out of order: {previous} before {current}")]
    OutOfOrder {
        producer: usize,
        previous: u64,
        current: u64,
    },

    #[error("dequeued value {value:#x} was never enqueued")]
    Corrupted { value: u64 },

    #[error("stress run did not finish within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("a worker thread panicked")]
    WorkerPanicked,
}

/// Check a set of dequeue histories, one per consumer, against the values
/// `producers` producers enqueued with sequences `0..items_per_producer`.
///
/// Returns the number of values checked.
///
pub fn verify_history(
    producers: usize,
    items_per_producer: u64,
    histories: &[Vec<u64>],
) -> Result<u64, StressError> {
    let mut seen = vec![vec![false; items_per_producer as usize]; producers];
    let mut count = 0u64;

    for history in histories {
        // Last sequence this consumer saw from each producer.
        let mut last: Vec<Option<u64>> = vec![None; producers];

        for &value in history {
            let (producer, seq) = decode(value);
            if producer >= producers || seq >= items_per_producer {
                return Err(StressError::Corrupted { value });
            }

            let slot = &mut seen[producer][seq as usize];
            if *slot {
                return Err(StressError::Duplicate { value });
            }
            *slot = true;

            if let Some(previous) = last[producer] {
                if seq < previous {
                    return Err(StressError::OutOfOrder {
                        producer,
                        previous,
                        current: seq,
                    });
                }
            }
            last[producer] = Some(seq);
            count += 1;
        }
    }

    let expected = producers as u64 * items_per_producer;
    if count != expected {
        return Err(StressError::Lost {
            missing: expected - count,
        });
    }

    Ok(count)
}

/// Run the stress scenario against a fresh `Q`.
pub fn run_stress<Q>(config: &StressConfig) -> Result<StressReport, StressError>
where
    Q: ConcurrentQueue<u64> + Default + Send + Sync + 'static,
{
    run_stress_on(Arc::new(Q::default()), config)
}

/// Run the stress scenario against an existing queue, which must start empty.
///
/// Producers enqueue their ranges in order; consumers dequeue until the total
/// has been collected. All workers start together behind a barrier.
///
pub fn run_stress_on<Q>(queue: Arc<Q>, config: &StressConfig) -> Result<StressReport, StressError>
where
    Q: ConcurrentQueue<u64> + Send + Sync + 'static,
{
    let total = config.total_items();
    let workers = config.producers + config.consumers;

    let start = Arc::new(Barrier::new(workers));
    let finished = Arc::new(CountdownEvent::new(workers));
    let consumed = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..config.producers)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            let signal = SignalOnDrop(Arc::clone(&finished));
            let stop = Arc::clone(&stop);
            let items = config.items_per_producer;
            let mut jitter = Jitter::new(config.jitter_seed, producer);

            thread::spawn(move || {
                let _signal = signal;
                start.wait();
                for seq in 0..items {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    queue.enqueue(encode(producer, seq));
                    jitter.pause();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..config.consumers)
        .map(|consumer| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            let signal = SignalOnDrop(Arc::clone(&finished));
            let consumed = Arc::clone(&consumed);
            let stop = Arc::clone(&stop);
            let mut jitter = Jitter::new(config.jitter_seed, config.producers + consumer);

            thread::spawn(move || {
                let _signal = signal;
                let mut history = Vec::new();
                let mut empty_polls = 0u64;

                start.wait();
                while consumed.load(Ordering::Relaxed) < total && !stop.load(Ordering::Relaxed) {
                    match queue.dequeue() {
                        Some(value) => {
                            history.push(value);
                            consumed.fetch_add(1, Ordering::Relaxed);
                            jitter.pause();
                        }
                        None => {
                            empty_polls += 1;
                            thread::yield_now();
                        }
                    }
                }

                (history, empty_polls)
            })
        })
        .collect();

    let started = Instant::now();
    if !finished.wait_timeout(config.timeout) {
        stop.store(true, Ordering::Relaxed);
        warn!(
            timeout = ?config.timeout,
            consumed = consumed.load(Ordering::Relaxed),
            total,
            "stress run timed out"
        );
        return Err(StressError::Timeout {
            timeout: config.timeout,
        });
    }
    let elapsed = started.elapsed();

    for producer in producers {
        producer.join().map_err(|_| StressError::WorkerPanicked)?;
    }

    let mut histories = Vec::with_capacity(config.consumers);
    let mut empty_polls = 0u64;
    for consumer in consumers {
        let (history, polls) = consumer.join().map_err(|_| StressError::WorkerPanicked)?;
        histories.push(history);
        empty_polls += polls;
    }

    let dequeued = verify_history(config.producers, config.items_per_producer, &histories)
        .inspect_err(|error| warn!(%error, "stress run failed verification"))?;

    info!(
        producers = config.producers,
        consumers = config.consumers,
        dequeued,
        empty_polls,
        elapsed_ms = elapsed.as_millis() as u64,
        "stress run verified"
    );

    Ok(StressReport {
        dequeued,
        empty_polls,
        elapsed,
    })
}

// Signals the countdown when a worker exits, including by panic.
struct SignalOnDrop(Arc<CountdownEvent>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        self.0.signal();
    }
}

// Random yields and short spins between operations, to shake out interleavings
// that a tight loop on an idle machine rarely produces.
struct Jitter {
    rng: Option<StdRng>,
}

impl Jitter {
    fn new(seed: Option<u64>, worker: usize) -> Self {
        Jitter {
            rng: seed.map(|seed| StdRng::seed_from_u64(seed ^ (worker as u64).rotate_left(17))),
        }
    }

    fn pause(&mut self) {
        let Some(rng) = self.rng.as_mut() else {
            return;
        };

        if rng.random_bool(0.02) {
            thread::yield_now();
        } else if rng.random_bool(0.1) {
            for _ in 0..rng.random_range(1..64) {
                std::hint::spin_loop();
            }
        }
    }
}
