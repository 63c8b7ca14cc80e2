//! Mock transport for testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::TransportPort;
use crate::types::RawFrame;

/// A scripted reply: when a frame is sent to `request_id` whose data starts
/// with `request_prefix`, the `responses` are queued for reception.
#[derive(Debug, Clone)]
struct ScriptedResponse {
    request_id: u32,
    request_prefix: Vec<u8>,
    responses: Vec<RawFrame>,
}

/// In-memory transport with scripted responses and failure injection
pub struct MockTransport {
    ready: AtomicBool,
    /// Number of upcoming `open()` calls that fail
    open_failures: AtomicU32,
    open_calls: AtomicU32,
    inbound: Mutex<VecDeque<RawFrame>>,
    available: Condvar,
    sent: Mutex<Vec<RawFrame>>,
    responses: Mutex<Vec<ScriptedResponse>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            open_failures: AtomicU32::new(0),
            open_calls: AtomicU32::new(0),
            inbound: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            sent: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `count` calls to `open()` fail
    pub fn fail_next_opens(&self, count: u32) {
        self.open_failures.store(count, Ordering::SeqCst);
    }

    /// Number of times `open()` has been called
    pub fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Force the readiness flag (simulates the adapter dropping out)
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Queue a frame as if it had arrived from the bus
    pub fn push_inbound(&self, frame: RawFrame) {
        self.inbound.lock().push_back(frame);
        self.available.notify_all();
    }

    /// Reply with `responses` whenever a matching request is sent
    pub fn add_response(&self, request_id: u32, request_prefix: &[u8], responses: Vec<RawFrame>) {
        self.responses.lock().push(ScriptedResponse {
            request_id,
            request_prefix: request_prefix.to_vec(),
            responses,
        });
    }

    /// All frames sent so far
    pub fn sent_frames(&self) -> Vec<RawFrame> {
        self.sent.lock().clone()
    }

    /// Frames still waiting to be received
    pub fn pending_inbound(&self) -> usize {
        self.inbound.lock().len()
    }

    fn find_responses(&self, id: u32, data: &[u8]) -> Vec<RawFrame> {
        self.responses
            .lock()
            .iter()
            .filter(|r| r.request_id == id && data.starts_with(&r.request_prefix))
            .flat_map(|r| r.responses.iter().copied())
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportPort for MockTransport {
    fn open(&self) -> bool {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .open_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            log::debug!("Mock transport: simulated open failure");
            self.ready.store(false, Ordering::SeqCst);
            return false;
        }

        self.ready.store(true, Ordering::SeqCst);
        true
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn send(&self, id: u32, data: &[u8], extended: bool) -> bool {
        if !self.is_ready() {
            return false;
        }

        let frame = RawFrame::new(id, data).extended(extended);
        self.sent.lock().push(frame);

        let replies = self.find_responses(id, data);
        if !replies.is_empty() {
            let mut inbound = self.inbound.lock();
            inbound.extend(replies);
            drop(inbound);
            self.available.notify_all();
        }
        true
    }

    fn receive(&self, timeout: Duration) -> Option<RawFrame> {
        let deadline = Instant::now() + timeout;
        let mut inbound = self.inbound.lock();

        loop {
            if let Some(frame) = inbound.pop_front() {
                return Some(frame);
            }
            if self.available.wait_until(&mut inbound, deadline).timed_out() {
                return inbound.pop_front();
            }
        }
    }

    fn close(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }
}
