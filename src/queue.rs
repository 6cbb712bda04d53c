//! A bounded, drop-oldest FIFO shared by the Output Coordinator and each Pipe
//! Sink Worker. Guarded by a single mutex; no condition variables, per the
//! busy-wait-with-backoff concurrency model (spec §5).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 500_000;
const POLL_BACKOFF: Duration = Duration::from_millis(10);

pub struct BoundedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Push `item`, dropping the oldest element if the queue is already at
    /// capacity. Returns `true` if an element was dropped.
    pub fn push(&self, item: T) -> bool {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        let mut dropped = false;
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            dropped = true;
        }
        guard.push_back(item);
        dropped
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.lock().expect("queue mutex poisoned").pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Block (via backoff poll) until an element is available or `still_running`
    /// returns false and the queue is empty.
    pub fn pop_blocking(&self, still_running: impl Fn() -> bool) -> Option<T> {
        loop {
            if let Some(item) = self.pop() {
                return Some(item);
            }
            if !still_running() {
                return None;
            }
            std::thread::sleep(POLL_BACKOFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_oldest_keeps_newest_n() {
        let q: BoundedQueue<u32> = BoundedQueue::new(3);
        for i in 0..5 {
            q.push(i);
        }
        let mut drained = Vec::new();
        while let Some(v) = q.pop() {
            drained.push(v);
        }
        assert_eq!(drained, vec![2, 3, 4]);
        assert_eq!(q.dropped_count(), 2);
    }

    #[test]
    fn million_plus_one_drops_oldest_and_keeps_capacity() {
        let q: BoundedQueue<u32> = BoundedQueue::new(DEFAULT_CAPACITY);
        for i in 0..(DEFAULT_CAPACITY as u32 + 1) {
            q.push(i);
        }
        assert_eq!(q.len(), DEFAULT_CAPACITY);
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.pop(), Some(1));
    }
}
