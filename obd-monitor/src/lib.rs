//! OBD Monitor Library
//!
//! A telemetry acquisition engine for electric vehicles that talks OBD-II and
//! UDS over a CAN channel supplied by the host application.
//!
//! # Architecture
//!
//! - A worker thread polls a round-robin table of OBD-II PIDs and drains
//!   inbound frames from the transport and from an injection queue
//! - Frames are decoded into field updates (OBD-II responses, UDS State of
//!   Health, vehicle broadcast signals, multi-frame VIN)
//! - Updates land in a lock-protected telemetry record with per-consumer
//!   change tracking
//! - Observers are notified with snapshots; raw frames can be mirrored to raw
//!   observers; changes can be published to a broker client
//!
//! The library does NOT:
//! - Implement the physical link to the adapter (see [`TransportPort`])
//! - Implement an MQTT client (see [`BrokerPublisher`])
//! - Persist telemetry
//!
//! # Example Usage
//!
//! ```no_run
//! use obd_monitor::{MonitorConfig, ObdMonitor, ReplayTransport, VehicleTelemetry};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let transport = ReplayTransport::from_candump(Path::new("drive.log")).unwrap();
//! let config = MonitorConfig::new().with_poll_interval(Duration::from_secs(1));
//!
//! let monitor = ObdMonitor::new(Arc::new(transport), config);
//! monitor.add_telemetry_observer(|t: &VehicleTelemetry| {
//!     println!("SOC {:?}% speed {:?} km/h", t.state_of_charge, t.speed);
//! });
//! monitor.start().unwrap();
//!
//! monitor.set_field("rssi", "-67").unwrap();
//! if let Some(soh) = monitor.request_state_of_health() {
//!     println!("SOH {:.2}%", soh);
//! }
//!
//! std::thread::sleep(Duration::from_secs(10));
//! monitor.stop();
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod connection;
pub mod formats;
pub mod isotp;
pub mod monitor;
pub mod observer;
pub mod publish;
pub mod queue;
pub mod relay;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use codec::FrameCodec;
pub use config::{MonitorConfig, PublishConfig};
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use formats::CandumpParser;
pub use monitor::ObdMonitor;
pub use observer::{RawFrameObserver, TelemetryObserver};
pub use publish::{BrokerMessage, BrokerPublisher};
pub use relay::RawCaptureRelay;
pub use scheduler::SchedulerState;
pub use store::{DirtyCursor, TelemetryStore, VehicleTelemetry};
pub use transport::{MockTransport, ReplayTransport, TransportPort};
pub use types::{FieldUpdate, Gear, MonitorError, RawFrame, Result, Timestamp, WheelSpeeds};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
