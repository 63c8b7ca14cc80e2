//! OBD-II (SAE J1979) request building and response decoding
//!
//! Single-frame responses look like `[len, 0x41, pid, A, B, ...]`. Only
//! "show current data" responses (mode 0x41) carry telemetry; everything else
//! is ignored. Multi-frame information responses (VIN) are reassembled by the
//! ISO-TP layer and handed to [`decode_information`].

use byteorder::{BigEndian, ByteOrder};

use crate::types::FieldUpdate;

// Request modes
pub const MODE_CURRENT: u8 = 0x01;
pub const MODE_INFORMATION: u8 = 0x09;
pub const MODE_CUSTOM: u8 = 0x22;

// Response modes (request mode + 0x40)
pub const MODE_CURRENT_RESPONSE: u8 = 0x41;
pub const MODE_INFORMATION_RESPONSE: u8 = 0x49;

// PIDs
pub const PID_VIN: u16 = 0x02;
pub const PID_VEHICLE_SPEED: u16 = 0x0D;
pub const PID_CONTROL_MODULE_VOLTAGE: u16 = 0x42;
pub const PID_AMBIENT_AIR_TEMPERATURE: u16 = 0x46;
pub const PID_BATTERY_PACK_SOC: u16 = 0x5B;

/// VIN length in characters
pub const VIN_LENGTH: usize = 17;

/// A request issued by the poll scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRequest {
    pub mode: u8,
    pub pid: u16,
}

/// Round-robin request table
pub const PID_REQUESTS: [PidRequest; 5] = [
    PidRequest { mode: MODE_INFORMATION, pid: PID_VIN },
    PidRequest { mode: MODE_CURRENT, pid: PID_CONTROL_MODULE_VOLTAGE },
    PidRequest { mode: MODE_CURRENT, pid: PID_AMBIENT_AIR_TEMPERATURE },
    PidRequest { mode: MODE_CURRENT, pid: PID_BATTERY_PACK_SOC },
    PidRequest { mode: MODE_CURRENT, pid: PID_VEHICLE_SPEED },
];

impl PidRequest {
    /// Encode this request as a zero-padded single frame
    pub fn to_frame(self) -> [u8; 8] {
        pid_request(self.mode, self.pid)
    }
}

/// Build the 8-byte request frame for a mode/PID pair
///
/// Modes 0x01/0x09 carry a one-byte PID, mode 0x22 a two-byte DID.
pub fn pid_request(mode: u8, pid: u16) -> [u8; 8] {
    let mut data = [0u8; 8];
    match mode {
        MODE_CUSTOM => {
            data[0] = 3;
            data[1] = mode;
            data[2] = (pid >> 8) as u8;
            data[3] = (pid & 0xFF) as u8;
        }
        _ => {
            data[0] = 2;
            data[1] = mode;
            data[2] = (pid & 0xFF) as u8;
        }
    }
    data
}

/// Decode a single-frame OBD-II response
pub fn decode(data: &[u8]) -> Vec<FieldUpdate> {
    // [len, mode, pid] at minimum, single frame PCI only
    if data.len() < 3 || data[0] & 0xF0 != 0 {
        return Vec::new();
    }

    let mode = data[1];
    if mode != MODE_CURRENT_RESPONSE {
        return Vec::new();
    }

    let pid = data[2] as u16;
    let update = match pid {
        PID_VEHICLE_SPEED if data.len() >= 4 => Some(FieldUpdate::Speed(data[3] as i32)),
        PID_BATTERY_PACK_SOC if data.len() >= 4 => {
            Some(FieldUpdate::StateOfCharge(scale_percent(data[3])))
        }
        PID_CONTROL_MODULE_VOLTAGE if data.len() >= 5 => {
            let millivolts = BigEndian::read_u16(&data[3..5]);
            Some(FieldUpdate::AuxBatteryVoltage(millivolts as f64 / 1000.0))
        }
        PID_AMBIENT_AIR_TEMPERATURE if data.len() >= 4 => {
            Some(FieldUpdate::AmbientTemperature(data[3] as i32 - 40))
        }
        _ => None,
    };

    update.into_iter().collect()
}

/// Decode a reassembled mode 0x09 payload (`[0x49, pid, ...]`)
pub fn decode_information(payload: &[u8]) -> Vec<FieldUpdate> {
    if payload.len() < 2 || payload[0] != MODE_INFORMATION_RESPONSE {
        return Vec::new();
    }

    match payload[1] as u16 {
        PID_VIN => decode_vin(&payload[2..]).map(FieldUpdate::Vin).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Extract the VIN from the bytes following `[0x49, 0x02]`
///
/// Most ECUs prefix the 17 characters with a data-item count byte; the VIN is
/// always the trailing 17 bytes.
fn decode_vin(bytes: &[u8]) -> Option<String> {
    let trimmed: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0).collect();
    if trimmed.len() < VIN_LENGTH {
        return None;
    }

    let vin = &trimmed[trimmed.len() - VIN_LENGTH..];
    if !vin.iter().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    Some(String::from_utf8_lossy(vin).into_owned())
}

/// `round(raw * 100 / 255)`
fn scale_percent(raw: u8) -> i32 {
    ((raw as f64 * 100.0 / 255.0) + 0.5) as i32
}
