//! Core types for the OBD monitor library
//!
//! This module defines the frame type that flows from the transport into the
//! decoder, the field updates the decoder emits, and the error type shared by
//! the whole engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the monitor
pub type Timestamp = DateTime<Utc>;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Largest identifier representable with an 11-bit (standard) CAN ID
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// A single CAN frame as observed on the bus
///
/// Frames are immutable once constructed and cheap to copy; the raw capture
/// relay receives them by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub id: u32,
    /// Frame data, zero-padded beyond `length`
    pub data: [u8; 8],
    /// Number of valid data bytes (0-8)
    pub length: u8,
    /// Receive time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// True if this is a remote transmission request
    pub is_rtr: bool,
}

impl RawFrame {
    /// Build a data frame stamped with the current time.
    ///
    /// Payloads longer than 8 bytes are truncated. The extended flag is
    /// inferred from the identifier.
    pub fn new(id: u32, payload: &[u8]) -> Self {
        Self::with_timestamp(id, payload, now_millis())
    }

    /// Build a data frame with an explicit timestamp
    pub fn with_timestamp(id: u32, payload: &[u8], timestamp_ms: u64) -> Self {
        let length = payload.len().min(8);
        let mut data = [0u8; 8];
        data[..length].copy_from_slice(&payload[..length]);

        Self {
            id,
            data,
            length: length as u8,
            timestamp_ms,
            is_extended: id > MAX_STANDARD_ID,
            is_rtr: false,
        }
    }

    /// Builder method: override the extended flag
    pub fn extended(mut self, is_extended: bool) -> Self {
        self.is_extended = is_extended;
        self
    }

    /// Builder method: mark as remote transmission request
    pub fn rtr(mut self, is_rtr: bool) -> Self {
        self.is_rtr = is_rtr;
        self
    }

    /// The valid data bytes of this frame
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc()]
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        (self.length as usize).min(8)
    }

    /// Convert the millisecond timestamp to a DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        DateTime::from_timestamp_millis(self.timestamp_ms as i64).unwrap_or_else(Utc::now)
    }
}

/// Renders the frame in candump's compact `ID#DATA` notation
impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}#", self.id)?;
        } else {
            write!(f, "{:03X}#", self.id)?;
        }
        if self.is_rtr {
            return write!(f, "R");
        }
        for byte in self.payload() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Gear selector position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gear {
    #[serde(rename = "P")]
    Park,
    #[serde(rename = "R")]
    Reverse,
    #[serde(rename = "N")]
    Neutral,
    #[serde(rename = "D")]
    Drive,
    #[default]
    #[serde(rename = "U")]
    Unknown,
}

impl Gear {
    /// Translate the 2-bit selector field of the gear broadcast frame
    pub fn from_selector(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Gear::Park,
            1 => Gear::Reverse,
            2 => Gear::Neutral,
            _ => Gear::Drive,
        }
    }

    /// Single-letter code (P/R/N/D/U)
    pub fn as_char(&self) -> char {
        match self {
            Gear::Park => 'P',
            Gear::Reverse => 'R',
            Gear::Neutral => 'N',
            Gear::Drive => 'D',
            Gear::Unknown => 'U',
        }
    }

    /// Parse a single-letter gear code
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'P' => Some(Gear::Park),
            'R' => Some(Gear::Reverse),
            'N' => Some(Gear::Neutral),
            'D' => Some(Gear::Drive),
            'U' => Some(Gear::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Individual wheel speeds in km/h
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

/// A single telemetry field change produced by the frame decoder
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Vehicle identification number (mode 0x09 PID 0x02)
    Vin(String),
    /// Battery state of charge in percent
    StateOfCharge(i32),
    /// Battery state of health in percent
    StateOfHealth(f64),
    /// 12V auxiliary battery / control module voltage
    AuxBatteryVoltage(f64),
    /// Ambient air temperature in °C
    AmbientTemperature(i32),
    /// Vehicle speed in km/h
    Speed(i32),
    /// Odometer in km
    Odometer(u32),
    /// Gear selector position
    Gear(Gear),
    /// Link signal strength, supplied by the host
    SignalStrength(i32),
    /// High-voltage battery voltage in V
    HvBatteryVoltage(f64),
    /// High-voltage battery current in A (negative = charging)
    HvBatteryCurrent(f64),
    /// Charging power in kW
    ChargePower(f64),
    /// Steering wheel angle in degrees
    SteeringAngle(f64),
    /// Individual wheel speeds
    WheelSpeeds(WheelSpeeds),
}

impl FieldUpdate {
    /// Short field name used in logs and manual updates
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldUpdate::Vin(_) => "vin",
            FieldUpdate::StateOfCharge(_) => "soc",
            FieldUpdate::StateOfHealth(_) => "soh",
            FieldUpdate::AuxBatteryVoltage(_) => "voltage",
            FieldUpdate::AmbientTemperature(_) => "ambient",
            FieldUpdate::Speed(_) => "speed",
            FieldUpdate::Odometer(_) => "odometer",
            FieldUpdate::Gear(_) => "gear",
            FieldUpdate::SignalStrength(_) => "rssi",
            FieldUpdate::HvBatteryVoltage(_) => "hv_voltage",
            FieldUpdate::HvBatteryCurrent(_) => "hv_current",
            FieldUpdate::ChargePower(_) => "charge_power",
            FieldUpdate::SteeringAngle(_) => "steering_angle",
            FieldUpdate::WheelSpeeds(_) => "wheel_speeds",
        }
    }

    /// Parse a manual, string-encoded field update
    ///
    /// Accepts the short names (`soc`, `voltage`, `rssi`, ...) as well as the
    /// long snake_case names (`state_of_charge`, `signal_strength`, ...).
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = || MonitorError::InvalidFieldValue {
            field: field.to_string(),
            value: value.to_string(),
        };

        let update = match field.trim().to_ascii_lowercase().as_str() {
            "vin" => FieldUpdate::Vin(value.to_string()),
            "soc" | "state_of_charge" => {
                FieldUpdate::StateOfCharge(value.parse().map_err(|_| invalid())?)
            }
            "soh" | "state_of_health" => {
                FieldUpdate::StateOfHealth(parse_finite(value).ok_or_else(invalid)?)
            }
            "voltage" | "aux_battery_voltage" => {
                FieldUpdate::AuxBatteryVoltage(parse_finite(value).ok_or_else(invalid)?)
            }
            "ambient" | "ambient_temperature" => {
                FieldUpdate::AmbientTemperature(value.parse().map_err(|_| invalid())?)
            }
            "speed" => FieldUpdate::Speed(value.parse().map_err(|_| invalid())?),
            "odo" | "odometer" => FieldUpdate::Odometer(value.parse().map_err(|_| invalid())?),
            "gear" => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => FieldUpdate::Gear(Gear::from_char(c).ok_or_else(invalid)?),
                    _ => return Err(invalid()),
                }
            }
            "rssi" | "signal_strength" => {
                FieldUpdate::SignalStrength(value.parse().map_err(|_| invalid())?)
            }
            "hv_voltage" => FieldUpdate::HvBatteryVoltage(parse_finite(value).ok_or_else(invalid)?),
            "hv_current" => FieldUpdate::HvBatteryCurrent(parse_finite(value).ok_or_else(invalid)?),
            "charge_power" => FieldUpdate::ChargePower(parse_finite(value).ok_or_else(invalid)?),
            "steering_angle" => {
                FieldUpdate::SteeringAngle(parse_finite(value).ok_or_else(invalid)?)
            }
            _ => return Err(MonitorError::UnknownField(field.to_string())),
        };

        Ok(update)
    }
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Errors that can occur in the monitor
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Connection failed after {attempts} attempt(s)")]
    ConnectionFailed { attempts: u32 },

    #[error("Unknown telemetry field: {0}")]
    UnknownField(String),

    #[error("Invalid value {value:?} for field {field}")]
    InvalidFieldValue { field: String, value: String },

    #[error("Failed to parse log line {line}: {message}")]
    LogParseError { line: usize, message: String },

    #[error("Failed to spawn monitor worker: {0}")]
    WorkerSpawn(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_construction() {
        let frame = RawFrame::with_timestamp(0x7E8, &[0x03, 0x41, 0x0D, 0x32], 1_000);
        assert_eq!(frame.dlc(), 4);
        assert_eq!(frame.payload(), &[0x03, 0x41, 0x0D, 0x32]);
        assert_eq!(frame.data[4..], [0, 0, 0, 0]);
        assert!(!frame.is_extended);

        let frame = RawFrame::new(0x1FFF0120, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.dlc(), 8);
        assert!(frame.is_extended);
    }

    #[test]
    fn test_frame_display() {
        let frame = RawFrame::with_timestamp(0x1D0, &[0x00, 0x11, 0xAB], 0);
        assert_eq!(frame.to_string(), "1D0#0011AB");

        let frame = RawFrame::with_timestamp(0x1EC6AE80, &[0x07, 0x62], 0);
        assert_eq!(frame.to_string(), "1EC6AE80#0762");

        let frame = RawFrame::with_timestamp(0x123, &[], 0).rtr(true);
        assert_eq!(frame.to_string(), "123#R");
    }

    #[test]
    fn test_gear_translation() {
        assert_eq!(Gear::from_selector(0), Gear::Park);
        assert_eq!(Gear::from_selector(1), Gear::Reverse);
        assert_eq!(Gear::from_selector(2), Gear::Neutral);
        assert_eq!(Gear::from_selector(0xFF), Gear::Drive);
        assert_eq!(Gear::from_char('d'), Some(Gear::Drive));
        assert_eq!(Gear::from_char('x'), None);
    }

    #[test]
    fn test_parse_manual_updates() {
        assert_eq!(
            FieldUpdate::parse("rssi", "-67").unwrap(),
            FieldUpdate::SignalStrength(-67)
        );
        assert_eq!(
            FieldUpdate::parse("voltage", "12.45").unwrap(),
            FieldUpdate::AuxBatteryVoltage(12.45)
        );
        assert_eq!(
            FieldUpdate::parse("state_of_charge", " 85 ").unwrap(),
            FieldUpdate::StateOfCharge(85)
        );
        assert_eq!(FieldUpdate::parse("gear", "R").unwrap(), FieldUpdate::Gear(Gear::Reverse));
    }

    #[test]
    fn test_parse_manual_update_errors() {
        assert!(matches!(
            FieldUpdate::parse("boost", "1"),
            Err(MonitorError::UnknownField(_))
        ));
        assert!(matches!(
            FieldUpdate::parse("soc", "eighty"),
            Err(MonitorError::InvalidFieldValue { .. })
        ));
        assert!(FieldUpdate::parse("soh", "NaN").is_err());
        assert!(FieldUpdate::parse("gear", "DR").is_err());
    }
}
