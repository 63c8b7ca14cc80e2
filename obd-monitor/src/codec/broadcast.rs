//! Vehicle-specific broadcast frames
//!
//! These frames are sent periodically by the vehicle without a request and
//! are recognized purely by identifier. Fixed-point values are little-endian.

use byteorder::{ByteOrder, LittleEndian};

use super::ids;
use crate::types::{FieldUpdate, Gear, WheelSpeeds};

/// True if the identifier is a broadcast frame this module decodes
pub fn is_known(id: u32) -> bool {
    matches!(
        id,
        ids::ODOMETER_ID
            | ids::GEAR_ID
            | ids::STEERING_ANGLE_ID
            | ids::VEHICLE_SPEED_ID
            | ids::WHEEL_SPEEDS_ID
            | ids::BATTERY_SOC_ID
            | ids::HV_CURRENT_ID
            | ids::HV_VOLTAGE_ID
            | ids::CHARGE_POWER_ID
    )
}

/// Decode a broadcast frame; unknown or short frames yield nothing
pub fn decode(id: u32, data: &[u8]) -> Vec<FieldUpdate> {
    let update = match id {
        ids::ODOMETER_ID if data.len() >= 3 => {
            let km = ((data[0] as u32 & 0x0F) << 16) | ((data[1] as u32) << 8) | data[2] as u32;
            Some(FieldUpdate::Odometer(km))
        }
        ids::GEAR_ID if data.len() >= 7 => Some(FieldUpdate::Gear(Gear::from_selector(data[6]))),
        ids::VEHICLE_SPEED_ID if data.len() >= 4 => {
            // 0.01 km/h units, truncated to whole km/h
            let raw = LittleEndian::read_u16(&data[2..4]);
            Some(FieldUpdate::Speed((raw / 100) as i32))
        }
        ids::BATTERY_SOC_ID if !data.is_empty() => {
            // 0.5 % units, truncated to whole percent
            Some(FieldUpdate::StateOfCharge((data[0] / 2) as i32))
        }
        ids::HV_VOLTAGE_ID if data.len() >= 2 => Some(FieldUpdate::HvBatteryVoltage(
            LittleEndian::read_u16(&data[0..2]) as f64 * 0.1,
        )),
        ids::HV_CURRENT_ID if data.len() >= 2 => Some(FieldUpdate::HvBatteryCurrent(
            LittleEndian::read_i16(&data[0..2]) as f64 * 0.1,
        )),
        ids::CHARGE_POWER_ID if data.len() >= 2 => Some(FieldUpdate::ChargePower(
            LittleEndian::read_u16(&data[0..2]) as f64 * 0.1,
        )),
        ids::STEERING_ANGLE_ID if data.len() >= 2 => Some(FieldUpdate::SteeringAngle(
            LittleEndian::read_i16(&data[0..2]) as f64 * 0.1,
        )),
        ids::WHEEL_SPEEDS_ID if data.len() >= 8 => {
            let wheel = |i: usize| LittleEndian::read_u16(&data[i..i + 2]) as f64 * 0.01;
            Some(FieldUpdate::WheelSpeeds(WheelSpeeds {
                front_left: wheel(0),
                front_right: wheel(2),
                rear_left: wheel(4),
                rear_right: wheel(6),
            }))
        }
        _ => None,
    };

    update.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(update: &FieldUpdate) -> f64 {
        match update {
            FieldUpdate::HvBatteryVoltage(v)
            | FieldUpdate::HvBatteryCurrent(v)
            | FieldUpdate::ChargePower(v)
            | FieldUpdate::SteeringAngle(v) => *v,
            other => panic!("not a float update: {:?}", other),
        }
    }

    #[test]
    fn test_decode_odometer() {
        let updates = decode(ids::ODOMETER_ID, &[0x01, 0x02, 0x03]);
        assert_eq!(updates, vec![FieldUpdate::Odometer(66051)]);

        // High nibble of byte 0 is not part of the value
        let updates = decode(ids::ODOMETER_ID, &[0xF1, 0x02, 0x03]);
        assert_eq!(updates, vec![FieldUpdate::Odometer(0x10203)]);
    }

    #[test]
    fn test_decode_gear() {
        let frame = |b6: u8| [0, 0, 0, 0, 0, 0, b6, 0];
        assert_eq!(decode(ids::GEAR_ID, &frame(3)), vec![FieldUpdate::Gear(Gear::Drive)]);
        assert_eq!(decode(ids::GEAR_ID, &frame(0)), vec![FieldUpdate::Gear(Gear::Park)]);
        assert_eq!(decode(ids::GEAR_ID, &frame(0xFD)), vec![FieldUpdate::Gear(Gear::Reverse)]);
        assert!(decode(ids::GEAR_ID, &[0, 0, 0, 0, 0, 0]).is_empty());
    }

    #[test]
    fn test_decode_vehicle_speed() {
        // 0x2710 = 10000 -> 100.00 km/h
        let updates = decode(ids::VEHICLE_SPEED_ID, &[0xAA, 0xBB, 0x10, 0x27]);
        assert_eq!(updates, vec![FieldUpdate::Speed(100)]);
    }

    #[test]
    fn test_decode_battery_soc() {
        assert_eq!(decode(ids::BATTERY_SOC_ID, &[170]), vec![FieldUpdate::StateOfCharge(85)]);
        assert_eq!(decode(ids::BATTERY_SOC_ID, &[171]), vec![FieldUpdate::StateOfCharge(85)]);
    }

    #[test]
    fn test_decode_hv_values() {
        // 4000 -> 400.0 V
        let v = decode(ids::HV_VOLTAGE_ID, &[0xA0, 0x0F]);
        assert!((approx(&v[0]) - 400.0).abs() < 1e-9);

        // -1234 -> -123.4 A
        let raw = (-1234i16).to_le_bytes();
        let a = decode(ids::HV_CURRENT_ID, &raw);
        assert!((approx(&a[0]) + 123.4).abs() < 1e-9);

        // 1105 -> 110.5 kW
        let p = decode(ids::CHARGE_POWER_ID, &1105u16.to_le_bytes());
        assert!((approx(&p[0]) - 110.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_steering_angle() {
        let left = decode(ids::STEERING_ANGLE_ID, &(-450i16).to_le_bytes());
        assert!((approx(&left[0]) + 45.0).abs() < 1e-9);

        let right = decode(ids::STEERING_ANGLE_ID, &(900i16).to_le_bytes());
        assert!((approx(&right[0]) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_wheel_speeds() {
        let data = [0x10, 0x27, 0x20, 0x27, 0x00, 0x27, 0x30, 0x27];
        match &decode(ids::WHEEL_SPEEDS_ID, &data)[..] {
            [FieldUpdate::WheelSpeeds(speeds)] => {
                assert!((speeds.front_left - 100.0).abs() < 1e-9);
                assert!((speeds.front_right - 100.16).abs() < 1e-9);
                assert!((speeds.rear_left - 99.84).abs() < 1e-9);
                assert!((speeds.rear_right - 100.32).abs() < 1e-9);
            }
            other => panic!("unexpected updates: {:?}", other),
        }
        assert!(decode(ids::WHEEL_SPEEDS_ID, &data[..6]).is_empty());
    }

    #[test]
    fn test_short_frames_dropped() {
        assert!(decode(ids::ODOMETER_ID, &[0x01, 0x02]).is_empty());
        assert!(decode(ids::VEHICLE_SPEED_ID, &[0x00, 0x00, 0x10]).is_empty());
        assert!(decode(ids::BATTERY_SOC_ID, &[]).is_empty());
        assert!(decode(ids::HV_CURRENT_ID, &[0x01]).is_empty());
    }

    #[test]
    fn test_known_ids() {
        assert!(is_known(ids::ODOMETER_ID));
        assert!(is_known(ids::CHARGE_POWER_ID));
        assert!(!is_known(0x123));
        assert!(!is_known(ids::BECM_RECV_ID));
    }
}
