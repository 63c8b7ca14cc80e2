//! Observer interfaces for telemetry and raw frame notifications
//!
//! Any number of observers can be registered on an engine. Closures implement
//! both traits directly:
//!
//! ```
//! use obd_monitor::{RawFrame, RawFrameObserver, TelemetryObserver, VehicleTelemetry};
//!
//! let telemetry = |snapshot: &VehicleTelemetry| println!("SOC: {:?}", snapshot.state_of_charge);
//! let raw = |frame: &RawFrame| println!("{}", frame);
//! # fn takes<T: TelemetryObserver, R: RawFrameObserver>(_: T, _: R) {}
//! # takes(telemetry, raw);
//! ```
//!
//! Observers run on the worker thread and should return quickly.

use std::panic::{self, AssertUnwindSafe};

use crate::store::VehicleTelemetry;
use crate::types::RawFrame;

/// Notified with a snapshot after telemetry changes
pub trait TelemetryObserver: Send + Sync {
    fn on_telemetry(&self, snapshot: &VehicleTelemetry);
}

/// Notified with every frame the worker observes while raw capture is on
pub trait RawFrameObserver: Send + Sync {
    fn on_frame(&self, frame: &RawFrame);
}

impl<F> TelemetryObserver for F
where
    F: Fn(&VehicleTelemetry) + Send + Sync,
{
    fn on_telemetry(&self, snapshot: &VehicleTelemetry) {
        self(snapshot)
    }
}

impl<F> RawFrameObserver for F
where
    F: Fn(&RawFrame) + Send + Sync,
{
    fn on_frame(&self, frame: &RawFrame) {
        self(frame)
    }
}

/// Run an observer callback, containing any panic it raises
///
/// Returns false if the callback panicked.
pub(crate) fn guarded<F: FnOnce()>(what: &str, callback: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::warn!("{} observer panicked: {}", what, message);
            false
        }
    }
}
