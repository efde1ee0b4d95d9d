use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A one-shot event that becomes set after it has been signalled `count` times.
///
/// Used by the stress harness to wait for every worker thread with a deadline,
/// so a livelocked queue shows up as a timeout instead of a hung test.
///
pub struct CountdownEvent {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl CountdownEvent {
    // Create a new CountdownEvent with initial count.
    //
    pub fn new(count: usize) -> Self {
        CountdownEvent {
            count: Mutex::new(count),
            condvar: Condvar::new(),
        }
    }

    // Signal the event, decrementing count by one. Returns true for the signal
    // that set the event.
    //
    pub fn signal(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        if *count == 0 {
            self.condvar.notify_all();
            true
        } else {
            false
        }
    }

    // Remaining signals before the event is set.
    //
    pub fn remaining(&self) -> usize {
        *self.count.lock()
    }

    pub fn is_set(&self) -> bool {
        self.remaining() == 0
    }

    // Wait until count reaches zero.
    //
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.condvar.wait(&mut count);
        }
    }

    // Wait until count reaches zero or the timeout elapses. Returns whether the
    // event was set.
    //
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.condvar.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_signal_sets_event_once() {
        let event = CountdownEvent::new(2);
        assert!(!event.signal());
        assert!(event.signal());
        assert!(!event.signal());
        assert!(event.is_set());
    }

    #[test]
    fn test_wait_for_threads() {
        let event = Arc::new(CountdownEvent::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let event = Arc::clone(&event);
                thread::spawn(move || {
                    event.signal();
                })
            })
            .collect();

        event.wait();
        assert_eq!(event.remaining(), 0);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_wait_timeout_expires() {
        let event = CountdownEvent::new(1);
        assert!(!event.wait_timeout(Duration::from_millis(20)));
        assert_eq!(event.remaining(), 1);

        event.signal();
        assert!(event.wait_timeout(Duration::from_millis(20)));
    }
}
