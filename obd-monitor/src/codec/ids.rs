//! CAN identifiers used by the monitored vehicle

/// 29-bit functional OBD-II request address
pub const LONG_SEND_ID: u32 = 0x18DB33F1;
/// 29-bit physical response addresses (`0x18DAF1xx`)
pub const LONG_RECV_ID: u32 = 0x18DAF100;
pub const LONG_RECV_MASK: u32 = 0x1FFFFF00;

/// 11-bit functional OBD-II request address
pub const SHORT_SEND_ID: u32 = 0x7DF;
/// 11-bit response addresses (`0x7E8..=0x7EF`)
pub const SHORT_RECV_ID: u32 = 0x7E8;
pub const SHORT_RECV_MASK: u32 = 0x7F8;

/// Vehicle-specific extended broadcast frames
pub const ODOMETER_ID: u32 = 0x1FFF0120;
pub const GEAR_ID: u32 = 0x1FFF00A0;

/// Battery energy control module request address
pub const BECM_SEND_ID: u32 = 0x1DD01635;
/// Tester address the BECM answers on
pub const BECM_RECV_ID: u32 = 0x1EC6AE80;

/// Standard-ID broadcast frames
pub const STEERING_ANGLE_ID: u32 = 0x0D0;
pub const VEHICLE_SPEED_ID: u32 = 0x1D0;
pub const WHEEL_SPEEDS_ID: u32 = 0x2A0;
pub const BATTERY_SOC_ID: u32 = 0x348;
pub const HV_CURRENT_ID: u32 = 0x3D2;
pub const HV_VOLTAGE_ID: u32 = 0x3D3;
pub const CHARGE_POWER_ID: u32 = 0x4A8;

/// True if `id` is an OBD-II responder address (11-bit or 29-bit)
pub fn is_obd_response_id(id: u32) -> bool {
    if id > crate::types::MAX_STANDARD_ID {
        id & LONG_RECV_MASK == LONG_RECV_ID
    } else {
        id & SHORT_RECV_MASK == SHORT_RECV_ID
    }
}

/// Address a flow-control frame must be sent to for a given responder
///
/// 29-bit responders swap the two low bytes (target/source), 11-bit
/// responders sit 8 above their request address.
pub fn flow_control_id(sender: u32) -> u32 {
    if sender > crate::types::MAX_STANDARD_ID {
        (sender & 0xFFFF_0000) | ((sender & 0xFF) << 8) | ((sender & 0xFF00) >> 8)
    } else {
        sender.wrapping_sub(8)
    }
}
