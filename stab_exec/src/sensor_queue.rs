//! # Sensor queue
//!
//! A FIFO shared between a sensor producer thread and the stabilisation loop. Producers are never
//! blocked: `push` takes the lock for a single append and returns. The consumer can either poll
//! with `pop_front` or wait with a bounded timeout using `pop_front_timeout`.
//!
//! By default the queue is unbounded. An optional maximum length makes the queue shed its oldest
//! element on overflow. In both cases a high water mark is kept so that sustained producer and
//! consumer rate mismatches can be observed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::warn;
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Thread safe FIFO of timestamped sensor data.
pub struct SensorQueue<T> {
    /// Name used in log messages
    name: &'static str,

    /// Maximum number of elements, `None` for unbounded
    max_len: Option<usize>,

    inner: Mutex<Inner<T>>,

    not_empty: Condvar,
}

/// Snapshot of a queue's occupancy counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Number of elements currently queued
    pub len: usize,

    /// Largest number of elements ever queued at once
    pub high_water_mark: usize,

    /// Total number of elements pushed
    pub num_pushed: u64,

    /// Number of elements dropped from the head because the queue was full
    pub num_shed: u64,
}

struct Inner<T> {
    buf: VecDeque<T>,
    stats: QueueStats,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> SensorQueue<T> {
    /// Create a new unbounded queue.
    pub fn new(name: &'static str) -> Self {
        Self::with_max_len(name, None)
    }

    /// Create a new queue which sheds its oldest element whenever more than `max_len` elements
    /// are queued. `None` leaves the queue unbounded.
    pub fn with_max_len(name: &'static str, max_len: Option<usize>) -> Self {
        Self {
            name,
            max_len: max_len.map(|m| m.max(1)),
            inner: Mutex::new(Inner {
                buf: VecDeque::new(),
                stats: QueueStats::default(),
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Append an item to the tail of the queue. Never blocks on the consumer.
    pub fn push(&self, item: T) {
        let num_shed = {
            let mut inner = self.lock();

            inner.buf.push_back(item);
            inner.stats.num_pushed += 1;

            let mut shed = false;
            if let Some(max) = self.max_len {
                if inner.buf.len() > max {
                    inner.buf.pop_front();
                    inner.stats.num_shed += 1;
                    shed = true;
                }
            }

            let len = inner.buf.len();
            if len > inner.stats.high_water_mark {
                inner.stats.high_water_mark = len;
            }

            match shed {
                true => Some(inner.stats.num_shed),
                false => None,
            }
        };

        self.not_empty.notify_one();

        // Report shedding at exponentially spaced counts so a sustained overload doesn't flood
        // the log
        if let Some(n) = num_shed {
            if n.is_power_of_two() {
                warn!("{} queue full, {} elements shed so far", self.name, n);
            }
        }
    }

    /// Remove and return the head of the queue, or `None` if it is empty.
    pub fn pop_front(&self) -> Option<T> {
        self.lock().buf.pop_front()
    }

    /// Remove and return the head of the queue, waiting up to `timeout` for an item to arrive.
    pub fn pop_front_timeout(&self, timeout: Duration) -> Option<T> {
        let guard = self.lock();

        let (mut guard, _) = self
            .not_empty
            .wait_timeout_while(guard, timeout, |i| i.buf.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        guard.buf.pop_front()
    }

    /// Remove and return the longest prefix of the queue whose elements all satisfy `pred`.
    ///
    /// Scanning stops at the first element which fails the predicate, which is left at the head
    /// of the queue along with everything behind it. The whole drain happens under one lock so a
    /// concurrent push cannot interleave with it.
    pub fn drain_while<F>(&self, mut pred: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut inner = self.lock();

        let n = inner.buf.iter().take_while(|i| pred(i)).count();

        inner.buf.drain(..n).collect()
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name given to the queue at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get a snapshot of the queue's counters.
    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();

        QueueStats {
            len: inner.buf.len(),
            ..inner.stats
        }
    }

    /// Acquire the lock. A panic in another thread while holding the lock cannot leave the deque
    /// in a torn state, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let q = SensorQueue::new("test");
        for i in 0..5 {
            q.push(i);
        }

        let out: Vec<i32> = std::iter::from_fn(|| q.pop_front()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn test_drain_while_leaves_tail() {
        let q = SensorQueue::new("test");
        for i in &[1, 2, 3, 10, 4] {
            q.push(*i);
        }

        assert_eq!(q.drain_while(|i| *i < 5), vec![1, 2, 3]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.drain_while(|i| *i < 5), Vec::<i32>::new());
        assert_eq!(q.pop_front(), Some(10));
    }

    #[test]
    fn test_high_water_mark_and_shedding() {
        let q = SensorQueue::with_max_len("test", Some(3));
        for i in 0..5 {
            q.push(i);
        }

        let stats = q.stats();
        assert_eq!(stats.len, 3);
        assert_eq!(stats.high_water_mark, 3);
        assert_eq!(stats.num_pushed, 5);
        assert_eq!(stats.num_shed, 2);

        // The oldest were shed
        assert_eq!(q.pop_front(), Some(2));

        let unbounded = SensorQueue::new("test");
        for i in 0..100 {
            unbounded.push(i);
        }
        unbounded.pop_front();
        assert_eq!(unbounded.stats().high_water_mark, 100);
        assert_eq!(unbounded.stats().len, 99);
        assert_eq!(unbounded.stats().num_shed, 0);
    }

    #[test]
    fn test_pop_timeout_empty() {
        let q: SensorQueue<u8> = SensorQueue::new("test");

        let start = Instant::now();
        assert!(q.pop_front_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_pop_timeout_wakes_on_push() {
        let q = Arc::new(SensorQueue::new("test"));

        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                q.push(42u32);
            })
        };

        let start = Instant::now();
        assert_eq!(q.pop_front_timeout(Duration::from_secs(5)), Some(42));
        assert!(start.elapsed() < Duration::from_secs(5));

        producer.join().unwrap();
    }

    #[test]
    fn test_concurrent_producer_keeps_order() {
        let q = Arc::new(SensorQueue::new("test"));

        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    q.push(i);
                }
            })
        };

        let mut received = Vec::with_capacity(10_000);
        while received.len() < 10_000 {
            if let Some(i) = q.pop_front_timeout(Duration::from_millis(100)) {
                received.push(i);
            }
        }
        producer.join().unwrap();

        assert!(received.windows(2).all(|w| w[0] + 1 == w[1]));
    }
}
