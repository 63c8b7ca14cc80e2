//! Engine handle
//!
//! [`ObdMonitor`] owns everything the acquisition engine needs: the transport,
//! the telemetry store, connection status, raw capture relay and the worker
//! thread. The host constructs one handle and calls into it from its own
//! thread; nothing is process-global.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::codec::{ids, uds, FrameCodec};
use crate::config::MonitorConfig;
use crate::connection::{ConnectionManager, ConnectionState, ConnectionStatus};
use crate::isotp::{IsoTpAssembler, IsoTpEvent};
use crate::observer::{RawFrameObserver, TelemetryObserver};
use crate::publish::BrokerPublisher;
use crate::queue::FrameQueue;
use crate::relay::RawCaptureRelay;
use crate::scheduler::{PollScheduler, SchedulerState};
use crate::store::{TelemetryStore, VehicleTelemetry};
use crate::transport::TransportPort;
use crate::types::{FieldUpdate, MonitorError, RawFrame, Result, MAX_STANDARD_ID};

/// State shared between the engine handle and its worker
pub(crate) struct Shared {
    pub(crate) config: MonitorConfig,
    pub(crate) transport: Arc<dyn TransportPort>,
    pub(crate) store: TelemetryStore,
    pub(crate) status: ConnectionStatus,
    pub(crate) relay: RawCaptureRelay,
    pub(crate) inbound: FrameQueue,
    pub(crate) observers: RwLock<Vec<Arc<dyn TelemetryObserver>>>,
    pub(crate) publisher: RwLock<Option<Arc<dyn BrokerPublisher>>>,
    pub(crate) running: AtomicBool,
    state: AtomicU8,
    /// Held by an on-demand SOH request so the worker leaves the receive
    /// path alone until the response has been consumed
    pub(crate) rx_guard: Mutex<()>,
    isotp: Mutex<IsoTpAssembler>,
    pub(crate) frames_seen: AtomicU64,
}

impl Shared {
    pub(crate) fn new(transport: Arc<dyn TransportPort>, config: MonitorConfig) -> Self {
        Self {
            inbound: FrameQueue::new(config.inbound_queue_capacity),
            isotp: Mutex::new(IsoTpAssembler::new(config.isotp_timeout())),
            config,
            transport,
            store: TelemetryStore::new(),
            status: ConnectionStatus::new(),
            relay: RawCaptureRelay::new(),
            observers: RwLock::new(Vec::new()),
            publisher: RwLock::new(None),
            running: AtomicBool::new(false),
            state: AtomicU8::new(SchedulerState::Idle as u8),
            rx_guard: Mutex::new(()),
            frames_seen: AtomicU64::new(0),
        }
    }

    fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn inject_frame(&self, frame: RawFrame) {
        if self.inbound.push(frame) {
            log::warn!(
                "Inbound frame queue full ({}), dropped oldest frame",
                self.inbound.capacity()
            );
        }
    }

    /// Route one observed frame through capture, reassembly and decoding
    pub(crate) fn handle_frame(&self, frame: RawFrame) {
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
        self.relay.forward(&frame);

        let mut updates = FrameCodec::decode(&frame);

        let event = self.isotp.lock().push(&frame);
        match event {
            IsoTpEvent::FlowControl { target } => {
                let extended = target > MAX_STANDARD_ID;
                if !self.transport.send(target, &FrameCodec::flow_control_frame(), extended) {
                    log::debug!("Flow control to 0x{:X} not sent", target);
                }
            }
            IsoTpEvent::Complete { source, payload } => {
                updates.extend(FrameCodec::decode_payload(source, &payload));
            }
            IsoTpEvent::Pending => {}
        }

        self.store.apply_all(updates);
    }
}

/// Telemetry acquisition engine
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use obd_monitor::{MockTransport, MonitorConfig, ObdMonitor, VehicleTelemetry};
///
/// let monitor = ObdMonitor::new(Arc::new(MockTransport::new()), MonitorConfig::default());
/// monitor.add_telemetry_observer(|t: &VehicleTelemetry| println!("{:?}", t.state_of_charge));
/// monitor.start()?;
/// println!("{}", monitor.connection_status());
/// monitor.stop();
/// # Ok::<(), obd_monitor::MonitorError>(())
/// ```
pub struct ObdMonitor {
    shared: Arc<Shared>,
    /// Worker handle; the lock also serializes start and stop
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ObdMonitor {
    pub fn new(transport: Arc<dyn TransportPort>, config: MonitorConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(transport, config)),
            worker: Mutex::new(None),
        }
    }

    /// Connect and spawn the worker
    ///
    /// Returns immediately with success if the engine is already running. On
    /// connection failure the engine stays idle and may be started again.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        let shared = &self.shared;

        if worker.is_some() && shared.state() == SchedulerState::Running {
            log::debug!("Monitor already running");
            return Ok(());
        }

        shared.set_state(SchedulerState::Starting);
        let config = &shared.config;
        if let Err(e) = ConnectionManager::new(shared.transport.as_ref(), &shared.status)
            .connect(config.connect_attempts, config.retry_delay())
        {
            shared.set_state(SchedulerState::Idle);
            return Err(e);
        }

        shared.running.store(true, Ordering::SeqCst);
        let scheduler = PollScheduler::new(Arc::clone(shared));
        let handle = thread::Builder::new()
            .name("obd-monitor".to_string())
            .spawn(move || scheduler.run())
            .map_err(|e| {
                shared.running.store(false, Ordering::SeqCst);
                shared.set_state(SchedulerState::Idle);
                MonitorError::WorkerSpawn(e.to_string())
            })?;

        *worker = Some(handle);
        shared.set_state(SchedulerState::Running);
        log::info!("Monitor started");
        Ok(())
    }

    /// Signal the worker, wait for it to exit and close the transport
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        let shared = &self.shared;
        shared.set_state(SchedulerState::Stopping);
        shared.running.store(false, Ordering::SeqCst);

        if handle.join().is_err() {
            log::error!("Monitor worker panicked");
        }

        shared.transport.close();
        shared.status.set(ConnectionState::Disconnected);
        shared.set_state(SchedulerState::Idle);
        log::info!("Monitor stopped");
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Consistent copy of all telemetry fields
    pub fn snapshot(&self) -> VehicleTelemetry {
        self.shared.store.snapshot()
    }

    /// Human-readable connection status
    pub fn connection_status(&self) -> String {
        self.shared.status.text()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.status.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.is_connected()
    }

    /// Out-of-band field update, e.g. `set_field("rssi", "-67")`
    ///
    /// Returns whether the stored value changed.
    pub fn set_field(&self, field: &str, value: &str) -> Result<bool> {
        self.shared.store.set_field(field, value)
    }

    /// Queue a frame from an outside source for the worker to process
    ///
    /// The queue is bounded; on overflow the oldest queued frame is dropped.
    pub fn inject_frame(&self, frame: RawFrame) {
        self.shared.inject_frame(frame);
    }

    /// Frames dropped from the injection queue due to overflow
    pub fn dropped_frames(&self) -> u64 {
        self.shared.inbound.dropped()
    }

    /// Frames processed since the engine was created
    pub fn frames_seen(&self) -> u64 {
        self.shared.frames_seen.load(Ordering::Relaxed)
    }

    /// Read the battery state of health from the BECM
    ///
    /// Blocks until the response arrives or the SOH timeout expires. On any
    /// failure the stored value is left untouched and `None` is returned.
    pub fn request_state_of_health(&self) -> Option<f64> {
        let shared = &self.shared;
        if !shared.transport.is_ready() {
            log::warn!("SOH request skipped: transport not ready");
            return None;
        }

        let _rx = shared.rx_guard.lock();

        let request = uds::read_did_request(uds::DID_STATE_OF_HEALTH);
        if !shared.transport.send(ids::BECM_SEND_ID, &request, true) {
            log::warn!("SOH request could not be sent");
            return None;
        }
        log::debug!("SOH request sent to 0x{:X}", ids::BECM_SEND_ID);

        let deadline = Instant::now() + shared.config.soh_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(frame) = shared.transport.receive(remaining) else {
                break;
            };

            if frame.id != ids::BECM_RECV_ID {
                // Unrelated traffic keeps flowing through the normal path
                shared.handle_frame(frame);
                continue;
            }

            shared.frames_seen.fetch_add(1, Ordering::Relaxed);
            shared.relay.forward(&frame);
            return match uds::decode_state_of_health(frame.payload()) {
                Some(soh) => {
                    shared.store.apply(FieldUpdate::StateOfHealth(soh));
                    log::info!("Battery SOH: {:.2}%", soh);
                    Some(soh)
                }
                None => {
                    log::warn!("Malformed SOH response: {}", frame);
                    None
                }
            };
        }

        log::warn!("SOH request timed out");
        None
    }

    /// Start forwarding every observed frame to the raw observers
    pub fn start_raw_capture(&self) {
        self.shared.relay.enable();
    }

    pub fn stop_raw_capture(&self) {
        self.shared.relay.disable();
    }

    pub fn is_raw_capture_active(&self) -> bool {
        self.shared.relay.is_active()
    }

    /// Register an observer notified once per telemetry change cycle
    pub fn add_telemetry_observer<O: TelemetryObserver + 'static>(&self, observer: O) {
        self.shared.observers.write().push(Arc::new(observer));
    }

    /// Register an observer for raw frames (active while raw capture is on)
    pub fn add_raw_observer<O: RawFrameObserver + 'static>(&self, observer: O) {
        self.shared.relay.add_observer(Arc::new(observer));
    }

    /// Install the broker client used when publishing is enabled
    pub fn set_publisher<P: BrokerPublisher + 'static>(&self, publisher: P) {
        *self.shared.publisher.write() = Some(Arc::new(publisher));
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Direct access to the telemetry store
    pub fn store(&self) -> &TelemetryStore {
        &self.shared.store
    }
}

impl Drop for ObdMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
