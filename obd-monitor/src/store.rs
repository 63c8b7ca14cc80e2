//! Shared vehicle telemetry record
//!
//! The record is guarded by a single lock held only for the duration of a
//! field read or write. Every change bumps an atomic version counter; each
//! consumer owns a [`DirtyCursor`] remembering the last version it drained,
//! so independent consumers (observers, broker publishing) never clear each
//! other's pending work.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::types::{FieldUpdate, Gear, Result, Timestamp, WheelSpeeds};

/// Snapshot of all telemetry fields
///
/// `None` means no valid reading has been received yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VehicleTelemetry {
    /// Empty until an information-mode response sets it
    pub vin: String,
    /// State of charge (%)
    pub state_of_charge: Option<i32>,
    /// State of health (%)
    pub state_of_health: Option<f64>,
    /// 12V battery voltage (V)
    pub aux_battery_voltage: Option<f64>,
    /// Ambient temperature (°C)
    pub ambient_temperature: Option<i32>,
    /// Vehicle speed (km/h)
    pub speed: Option<i32>,
    /// Odometer (km)
    pub odometer: Option<u32>,
    pub gear: Gear,
    /// Link signal strength, set by the host
    pub signal_strength: Option<i32>,
    /// High-voltage battery voltage (V)
    pub hv_battery_voltage: Option<f64>,
    /// High-voltage battery current (A)
    pub hv_battery_current: Option<f64>,
    /// Charging power (kW)
    pub charge_power: Option<f64>,
    /// Steering angle (degrees)
    pub steering_angle: Option<f64>,
    pub wheel_speeds: Option<WheelSpeeds>,
    /// Time of the last field change
    pub updated_at: Option<Timestamp>,
}

impl VehicleTelemetry {
    /// Apply an update, returning true if any value changed
    fn apply(&mut self, update: FieldUpdate) -> bool {
        match update {
            FieldUpdate::Vin(v) => replace(&mut self.vin, v),
            FieldUpdate::StateOfCharge(v) => replace(&mut self.state_of_charge, Some(v)),
            FieldUpdate::StateOfHealth(v) => replace(&mut self.state_of_health, Some(v)),
            FieldUpdate::AuxBatteryVoltage(v) => replace(&mut self.aux_battery_voltage, Some(v)),
            FieldUpdate::AmbientTemperature(v) => replace(&mut self.ambient_temperature, Some(v)),
            FieldUpdate::Speed(v) => replace(&mut self.speed, Some(v)),
            FieldUpdate::Odometer(v) => replace(&mut self.odometer, Some(v)),
            FieldUpdate::Gear(v) => replace(&mut self.gear, v),
            FieldUpdate::SignalStrength(v) => replace(&mut self.signal_strength, Some(v)),
            FieldUpdate::HvBatteryVoltage(v) => replace(&mut self.hv_battery_voltage, Some(v)),
            FieldUpdate::HvBatteryCurrent(v) => replace(&mut self.hv_battery_current, Some(v)),
            FieldUpdate::ChargePower(v) => replace(&mut self.charge_power, Some(v)),
            FieldUpdate::SteeringAngle(v) => replace(&mut self.steering_angle, Some(v)),
            FieldUpdate::WheelSpeeds(v) => replace(&mut self.wheel_speeds, Some(v)),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// A consumer's position in the change stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyCursor {
    seen: u64,
}

/// Thread-safe telemetry record with change tracking
#[derive(Debug, Default)]
pub struct TelemetryStore {
    data: Mutex<VehicleTelemetry>,
    version: AtomicU64,
}

impl TelemetryStore {
    /// Create a store with every field unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a field update; true if the stored value changed
    ///
    /// Writing an unchanged value does not mark the store dirty.
    pub fn apply(&self, update: FieldUpdate) -> bool {
        let shown = log::log_enabled!(log::Level::Debug).then(|| format!("{:?}", update));

        let mut data = self.data.lock();
        if !data.apply(update) {
            return false;
        }
        data.updated_at = Some(chrono::Utc::now());
        self.version.fetch_add(1, Ordering::Release);
        drop(data);

        if let Some(shown) = shown {
            log::debug!("Telemetry updated: {}", shown);
        }
        true
    }

    /// Apply several updates, returning how many changed a value
    pub fn apply_all(&self, updates: impl IntoIterator<Item = FieldUpdate>) -> usize {
        updates.into_iter().filter(|u| self.apply(u.clone())).count()
    }

    /// Manual, string-encoded update (e.g. signal strength from the host)
    pub fn set_field(&self, field: &str, value: &str) -> Result<bool> {
        let update = FieldUpdate::parse(field, value)?;
        Ok(self.apply(update))
    }

    /// Consistent copy of all fields
    pub fn snapshot(&self) -> VehicleTelemetry {
        self.data.lock().clone()
    }

    /// Current change counter
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Cursor positioned at the current version
    pub fn subscribe(&self) -> DirtyCursor {
        DirtyCursor {
            seen: self.version(),
        }
    }

    /// True if the store changed since `cursor` last drained it
    pub fn is_dirty(&self, cursor: &DirtyCursor) -> bool {
        self.version() != cursor.seen
    }

    /// Snapshot and advance `cursor` if anything changed since its last drain
    pub fn take_if_dirty(&self, cursor: &mut DirtyCursor) -> Option<VehicleTelemetry> {
        if !self.is_dirty(cursor) {
            return None;
        }

        // Version read under the lock matches the snapshot exactly
        let data = self.data.lock();
        cursor.seen = self.version.load(Ordering::Acquire);
        Some(data.clone())
    }

    /// Return every field to unknown
    pub fn reset(&self) {
        let mut data = self.data.lock();
        *data = VehicleTelemetry::default();
        self.version.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_unknown() {
        let store = TelemetryStore::new();
        let snapshot = store.snapshot();

        assert!(snapshot.vin.is_empty());
        assert_eq!(snapshot.state_of_charge, None);
        assert_eq!(snapshot.state_of_health, None);
        assert_eq!(snapshot.speed, None);
        assert_eq!(snapshot.gear, Gear::Unknown);
        assert_eq!(snapshot.updated_at, None);
    }

    #[test]
    fn test_change_detection() {
        let store = TelemetryStore::new();
        let mut cursor = store.subscribe();

        assert!(store.apply(FieldUpdate::Speed(50)));
        assert!(store.take_if_dirty(&mut cursor).is_some());

        // Same value again: not dirty
        assert!(!store.apply(FieldUpdate::Speed(50)));
        assert!(!store.is_dirty(&cursor));
        assert!(store.take_if_dirty(&mut cursor).is_none());

        assert!(store.apply(FieldUpdate::Speed(51)));
        assert_eq!(store.take_if_dirty(&mut cursor).unwrap().speed, Some(51));
    }

    #[test]
    fn test_independent_cursors() {
        let store = TelemetryStore::new();
        let mut observers = store.subscribe();
        let mut publisher = store.subscribe();

        store.apply(FieldUpdate::StateOfCharge(80));

        // Draining one consumer leaves the other's pending change intact
        assert!(store.take_if_dirty(&mut observers).is_some());
        assert!(store.is_dirty(&publisher));
        assert_eq!(
            store.take_if_dirty(&mut publisher).unwrap().state_of_charge,
            Some(80)
        );
        assert!(!store.is_dirty(&observers));
        assert!(!store.is_dirty(&publisher));
    }

    #[test]
    fn test_set_field() {
        let store = TelemetryStore::new();

        assert!(store.set_field("rssi", "-60").unwrap());
        assert!(!store.set_field("rssi", "-60").unwrap());
        assert!(store.set_field("vin", "LPSVSEDEEML123456").unwrap());
        assert!(store.set_field("nope", "1").is_err());
        assert!(store.set_field("speed", "fast").is_err());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.signal_strength, Some(-60));
        assert_eq!(snapshot.vin, "LPSVSEDEEML123456");
    }

    #[test]
    fn test_apply_all_counts_changes() {
        let store = TelemetryStore::new();
        let changed = store.apply_all(vec![
            FieldUpdate::Odometer(66051),
            FieldUpdate::Gear(Gear::Drive),
            FieldUpdate::Gear(Gear::Drive),
        ]);
        assert_eq!(changed, 2);
        assert!(store.snapshot().updated_at.is_some());
    }

    #[test]
    fn test_reset() {
        let store = TelemetryStore::new();
        let mut cursor = store.subscribe();
        store.apply(FieldUpdate::AmbientTemperature(22));
        store.take_if_dirty(&mut cursor);

        store.reset();
        assert!(store.is_dirty(&cursor));
        assert_eq!(store.snapshot(), VehicleTelemetry::default());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(TelemetryStore::new());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for v in 0..1000 {
                    store.apply(FieldUpdate::WheelSpeeds(WheelSpeeds {
                        front_left: v as f64,
                        front_right: v as f64,
                        rear_left: v as f64,
                        rear_right: v as f64,
                    }));
                }
            })
        };

        for _ in 0..1000 {
            if let Some(w) = store.snapshot().wheel_speeds {
                // Never a torn write
                assert_eq!(w.front_left, w.rear_right);
            }
        }
        writer.join().unwrap();
        assert_eq!(store.version(), 1000);
    }
}
