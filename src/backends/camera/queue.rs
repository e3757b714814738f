// SPDX-License-Identifier: GPL-3.0-only

//! Bounded acquisition queue between a capture device and the capture loop
//!
//! Producers never block: a full queue drops its oldest frame. The consumer
//! always takes the newest frame and discards everything queued before it.

use super::types::RawFrame;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Result of waiting on the queue
#[derive(Debug)]
pub enum Acquired {
    /// The newest queued frame
    Frame(RawFrame),
    /// Nothing arrived within the timeout
    Timeout,
    /// The queue was closed; no more frames will arrive
    Closed,
}

struct QueueInner {
    frames: VecDeque<RawFrame>,
    closed: bool,
}

/// Latest-wins ring of raw frames
pub struct FrameQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
    capacity: usize,
    discarded: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
            discarded: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a frame, evicting the oldest when full.
    ///
    /// Returns false if the queue is closed and the frame was dropped.
    pub fn push(&self, frame: RawFrame) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        while inner.frames.len() >= self.capacity {
            inner.frames.pop_front();
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
        inner.frames.push_back(frame);
        drop(inner);
        self.available.notify_one();
        true
    }

    /// Wait up to `timeout` for a frame and return the newest one
    pub fn acquire_latest(&self, timeout: Duration) -> Acquired {
        let inner = self.lock();
        let (mut inner, _) = self
            .available
            .wait_timeout_while(inner, timeout, |q| q.frames.is_empty() && !q.closed)
            .unwrap_or_else(|e| e.into_inner());

        if inner.closed {
            return Acquired::Closed;
        }

        match inner.frames.pop_back() {
            Some(frame) => {
                let stale = inner.frames.len() as u64;
                inner.frames.clear();
                if stale > 0 {
                    self.discarded.fetch_add(stale, Ordering::Relaxed);
                }
                Acquired::Frame(frame)
            }
            None => Acquired::Timeout,
        }
    }

    /// Drop all queued frames (used when the device changes)
    pub fn clear(&self) {
        let mut inner = self.lock();
        let stale = inner.frames.len() as u64;
        inner.frames.clear();
        self.discarded.fetch_add(stale, Ordering::Relaxed);
    }

    /// Close the queue and wake any waiter
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.frames.clear();
        drop(inner);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames dropped without ever being processed
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::RawFormat;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn frame(sequence: u64) -> RawFrame {
        RawFrame {
            width: 4,
            height: 4,
            format: RawFormat::Yuv420,
            planes: vec![],
            sequence,
            captured_at: Instant::now(),
        }
    }

    fn sequence_of(acquired: Acquired) -> Option<u64> {
        match acquired {
            Acquired::Frame(f) => Some(f.sequence),
            _ => None,
        }
    }

    #[test]
    fn test_takes_newest_and_discards_older() {
        let queue = FrameQueue::new(3);
        queue.push(frame(1));
        queue.push(frame(2));
        queue.push(frame(3));

        assert_eq!(sequence_of(queue.acquire_latest(Duration::ZERO)), Some(3));
        assert!(queue.is_empty());
        assert_eq!(queue.discarded(), 2);
    }

    #[test]
    fn test_full_queue_evicts_oldest() {
        let queue = FrameQueue::new(2);
        for seq in 0..5 {
            assert!(queue.push(frame(seq)));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.discarded(), 3);
        assert_eq!(sequence_of(queue.acquire_latest(Duration::ZERO)), Some(4));
    }

    #[test]
    fn test_timeout_when_empty() {
        let queue = FrameQueue::new(3);
        assert!(matches!(
            queue.acquire_latest(Duration::from_millis(5)),
            Acquired::Timeout
        ));
    }

    #[test]
    fn test_close_wakes_waiter() {
        let queue = Arc::new(FrameQueue::new(3));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.acquire_latest(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Acquired::Closed));
        assert!(queue.is_closed());
        assert!(!queue.push(frame(1)));
    }

    #[test]
    fn test_push_wakes_waiter() {
        let queue = Arc::new(FrameQueue::new(3));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || sequence_of(queue.acquire_latest(Duration::from_secs(10))))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(frame(7));
        assert_eq!(waiter.join().unwrap(), Some(7));
    }
}
