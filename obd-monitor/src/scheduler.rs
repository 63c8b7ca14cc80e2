//! Polling worker
//!
//! One dedicated thread runs [`PollScheduler::run`] until the engine's running
//! flag is cleared. Each iteration:
//!
//! 1. Sends the next PID request once the poll interval has elapsed
//! 2. Drains injected frames, then up to `frames_per_cycle` transport frames
//! 3. Notifies telemetry observers if the store changed
//! 4. Publishes changed telemetry to the broker, if configured
//! 5. Reports a silent bus once per silence period
//! 6. Sleeps for the loop interval
//!
//! The worker blocks only inside bounded receives and the loop sleep.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::codec::ids;
use crate::codec::obd2::PID_REQUESTS;
use crate::monitor::Shared;
use crate::observer::guarded;
use crate::publish;
use crate::store::DirtyCursor;

/// Engine lifecycle: `Idle → Starting → Running → Stopping → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl SchedulerState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerState::Starting,
            2 => SchedulerState::Running,
            3 => SchedulerState::Stopping,
            _ => SchedulerState::Idle,
        }
    }
}

/// State owned by the worker thread
pub(crate) struct PollScheduler {
    shared: Arc<Shared>,
    next_request: usize,
    last_request: Option<Instant>,
    frames_seen: u64,
    last_frame: Instant,
    asleep_reported: bool,
    telemetry_cursor: DirtyCursor,
    publish_cursor: DirtyCursor,
}

impl PollScheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let cursor = shared.store.subscribe();
        let frames_seen = shared.frames_seen.load(Ordering::Relaxed);
        Self {
            shared,
            next_request: 0,
            last_request: None,
            frames_seen,
            last_frame: Instant::now(),
            asleep_reported: false,
            telemetry_cursor: cursor,
            publish_cursor: cursor,
        }
    }

    /// Worker entry point
    pub(crate) fn run(mut self) {
        log::info!("Monitor worker started");

        while self.shared.running.load(Ordering::SeqCst) {
            self.step();
            thread::sleep(self.shared.config.loop_sleep());
        }

        log::info!("Monitor worker stopped");
    }

    /// One loop iteration, without the trailing sleep
    pub(crate) fn step(&mut self) {
        self.poll();
        self.drain();
        self.notify_observers();
        self.publish();
        self.check_idle();
    }

    fn poll(&mut self) {
        let shared = &self.shared;
        let due = self
            .last_request
            .map_or(true, |at| at.elapsed() >= shared.config.poll_interval());
        if !due || !shared.transport.is_ready() {
            return;
        }

        let request = PID_REQUESTS[self.next_request];
        let (id, extended) = if shared.config.extended_addressing {
            (ids::LONG_SEND_ID, true)
        } else {
            (ids::SHORT_SEND_ID, false)
        };

        if shared.transport.send(id, &request.to_frame(), extended) {
            log::debug!(
                "Sent PID request mode 0x{:02X} pid 0x{:02X} to 0x{:X}",
                request.mode,
                request.pid,
                id
            );
        } else {
            log::debug!("PID request 0x{:02X} not sent", request.pid);
        }

        self.next_request = (self.next_request + 1) % PID_REQUESTS.len();
        self.last_request = Some(Instant::now());
    }

    fn drain(&mut self) {
        let shared = &self.shared;

        for frame in shared.inbound.drain() {
            shared.handle_frame(frame);
        }

        if !shared.transport.is_ready() {
            return;
        }
        // An on-demand SOH request owns the receive path while it waits
        let Some(_rx) = shared.rx_guard.try_lock() else {
            return;
        };
        for _ in 0..shared.config.frames_per_cycle.max(1) {
            match shared.transport.receive(shared.config.receive_timeout()) {
                Some(frame) => shared.handle_frame(frame),
                None => break,
            }
        }
    }

    fn notify_observers(&mut self) {
        let Some(snapshot) = self.shared.store.take_if_dirty(&mut self.telemetry_cursor) else {
            return;
        };

        let observers = self.shared.observers.read().clone();
        for observer in observers {
            guarded("Telemetry", || observer.on_telemetry(&snapshot));
        }
    }

    fn publish(&mut self) {
        let shared = &self.shared;
        if !shared.config.publish.enabled {
            return;
        }
        let Some(publisher) = shared.publisher.read().clone() else {
            return;
        };
        let Some(snapshot) = shared.store.take_if_dirty(&mut self.publish_cursor) else {
            return;
        };

        let prefix = &shared.config.publish.topic_prefix;
        let sent = publish::publish_snapshot(publisher.as_ref(), &snapshot, prefix);
        log::debug!("Published {} telemetry messages under {}", sent, prefix);
    }

    fn check_idle(&mut self) {
        let seen = self.shared.frames_seen.load(Ordering::Relaxed);
        if seen != self.frames_seen {
            self.frames_seen = seen;
            self.last_frame = Instant::now();
            if self.asleep_reported {
                log::info!("CAN traffic resumed");
                self.asleep_reported = false;
            }
            return;
        }

        let silence = self.last_frame.elapsed();
        if !self.asleep_reported && silence >= self.shared.config.idle_timeout() {
            log::info!(
                "No CAN traffic for {}s, vehicle presumed asleep",
                silence.as_secs()
            );
            self.asleep_reported = true;
        }
    }
}
