//! Bounded queue for externally injected frames
//!
//! When full, the oldest entry is discarded to make room. The lock is held
//! only for the push or drain itself.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::types::RawFrame;

pub struct FrameQueue {
    frames: Mutex<VecDeque<RawFrame>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame; returns true if the oldest frame was dropped
    pub fn push(&self, frame: RawFrame) -> bool {
        let mut frames = self.frames.lock();
        let overflow = frames.len() >= self.capacity;
        if overflow {
            frames.pop_front();
        }
        frames.push_back(frame);
        drop(frames);

        if overflow {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        overflow
    }

    /// Remove and return everything queued, oldest first
    pub fn drain(&self) -> Vec<RawFrame> {
        self.frames.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames discarded due to overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u8) -> RawFrame {
        RawFrame::with_timestamp(0x100, &[n], n as u64)
    }

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new(4);
        assert!(!queue.push(frame(1)));
        assert!(!queue.push(frame(2)));

        let drained: Vec<u8> = queue.drain().iter().map(|f| f.data[0]).collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = FrameQueue::new(3);
        for n in 0..5 {
            queue.push(frame(n));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        let drained: Vec<u8> = queue.drain().iter().map(|f| f.data[0]).collect();
        assert_eq!(drained, vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity() {
        let queue = FrameQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(frame(1));
        assert!(queue.push(frame(2)));
        assert_eq!(queue.drain()[0].data[0], 2);
    }
}
