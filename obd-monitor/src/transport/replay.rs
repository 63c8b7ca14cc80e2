//! Replay transport - serves frames recorded in a candump log
//!
//! Frames are delivered in file order, one per `receive` call. Requests sent
//! by the engine are logged and discarded since a recording cannot answer them.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::TransportPort;
use crate::formats::CandumpParser;
use crate::types::{now_millis, RawFrame, Result};

pub struct ReplayTransport {
    frames: Vec<RawFrame>,
    queue: Mutex<VecDeque<RawFrame>>,
    /// How many more times to replay the whole recording after the first pass
    loops_remaining: AtomicUsize,
    /// Stamp frames with the current time instead of the recorded time
    restamp: bool,
    ready: AtomicBool,
}

impl ReplayTransport {
    /// Replay an in-memory list of frames once
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self {
            queue: Mutex::new(frames.iter().copied().collect()),
            frames,
            loops_remaining: AtomicUsize::new(0),
            restamp: false,
            ready: AtomicBool::new(false),
        }
    }

    /// Load a candump log
    pub fn from_candump(path: &Path) -> Result<Self> {
        let frames = CandumpParser::read_all(path)?;
        log::info!("Loaded {} frames for replay from {:?}", frames.len(), path);
        Ok(Self::new(frames))
    }

    /// Builder method: replay the recording `count` additional times
    pub fn with_loops(self, count: usize) -> Self {
        self.loops_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Builder method: stamp frames with the replay time
    pub fn with_restamp(mut self, enabled: bool) -> Self {
        self.restamp = enabled;
        self
    }

    /// Frames left in the current pass
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }

    /// True once every pass has been served
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0 && self.loops_remaining.load(Ordering::SeqCst) == 0
    }
}

impl TransportPort for ReplayTransport {
    fn open(&self) -> bool {
        self.ready.store(true, Ordering::SeqCst);
        true
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn send(&self, id: u32, data: &[u8], _extended: bool) -> bool {
        if !self.is_ready() {
            return false;
        }
        log::debug!("Replay: discarding request 0x{:X} {:02X?}", id, data);
        true
    }

    fn receive(&self, timeout: Duration) -> Option<RawFrame> {
        let mut queue = self.queue.lock();

        if queue.is_empty()
            && !self.frames.is_empty()
            && self
                .loops_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            queue.extend(self.frames.iter().copied());
        }

        match queue.pop_front() {
            Some(mut frame) => {
                if self.restamp {
                    frame.timestamp_ms = now_millis();
                }
                Some(frame)
            }
            None => {
                drop(queue);
                // Nothing left to replay: behave like a quiet bus
                std::thread::sleep(timeout);
                None
            }
        }
    }

    fn close(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> Vec<RawFrame> {
        vec![
            RawFrame::with_timestamp(0x348, &[0xAA], 1),
            RawFrame::with_timestamp(0x1D0, &[0, 0, 0x10, 0x27], 2),
        ]
    }

    #[test]
    fn test_replays_in_order() {
        let transport = ReplayTransport::new(frames());
        assert!(transport.open());

        assert_eq!(transport.receive(Duration::ZERO).map(|f| f.id), Some(0x348));
        assert_eq!(transport.receive(Duration::ZERO).map(|f| f.id), Some(0x1D0));
        assert!(transport.receive(Duration::from_millis(1)).is_none());
        assert!(transport.is_exhausted());
    }

    #[test]
    fn test_loops() {
        let transport = ReplayTransport::new(frames()).with_loops(1);
        transport.open();

        let ids: Vec<u32> = std::iter::from_fn(|| transport.receive(Duration::ZERO))
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![0x348, 0x1D0, 0x348, 0x1D0]);
    }

    #[test]
    fn test_restamp() {
        let transport = ReplayTransport::new(frames()).with_restamp(true);
        transport.open();
        let frame = transport.receive(Duration::ZERO).unwrap();
        assert!(frame.timestamp_ms > 1_000_000);
    }

    #[test]
    fn test_send_discarded() {
        let transport = ReplayTransport::new(Vec::new());
        assert!(!transport.send(0x7DF, &[2, 1, 0x0D], false));
        transport.open();
        assert!(transport.send(0x7DF, &[2, 1, 0x0D], false));
        transport.close();
        assert!(!transport.is_ready());
    }
}
