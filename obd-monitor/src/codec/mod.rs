//! Frame decoding engine
//!
//! Turns raw CAN frames into telemetry field updates. Decoding is pure: no
//! I/O, no shared state, and it never rejects input. Frames are routed purely
//! by identifier:
//!
//! 1. Diagnostic tester address → UDS State-of-Health response
//! 2. Known broadcast identifier → fixed-point broadcast signal
//! 3. OBD-II responder address → mode 0x41 PID response
//! 4. Anything else → no updates
//!
//! Malformed or short frames for a recognized identifier are dropped the same
//! way unknown identifiers are.

pub mod broadcast;
pub mod ids;
pub mod obd2;
pub mod uds;

use crate::types::{FieldUpdate, RawFrame};

/// Frame decoder - maps CAN frames to telemetry updates
pub struct FrameCodec;

impl FrameCodec {
    /// Decode a single CAN frame into zero or more field updates
    pub fn decode(frame: &RawFrame) -> Vec<FieldUpdate> {
        if frame.is_rtr {
            return Vec::new();
        }

        let data = frame.payload();
        let id = frame.id;

        if id == ids::BECM_RECV_ID {
            uds::decode(data)
        } else if broadcast::is_known(id) {
            broadcast::decode(id, data)
        } else if ids::is_obd_response_id(id) {
            obd2::decode(data)
        } else {
            log::trace!("Unknown CAN ID: 0x{:X}, no telemetry", id);
            Vec::new()
        }
    }

    /// Decode a reassembled multi-frame payload from `source`
    pub fn decode_payload(source: u32, payload: &[u8]) -> Vec<FieldUpdate> {
        if ids::is_obd_response_id(source) {
            obd2::decode_information(payload)
        } else {
            Vec::new()
        }
    }

    /// Flow-control frame answering a multi-frame first frame
    pub fn flow_control_frame() -> [u8; 8] {
        crate::isotp::FLOW_CONTROL_CONTINUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gear;

    fn frame(id: u32, data: &[u8]) -> RawFrame {
        RawFrame::with_timestamp(id, data, 0)
    }

    #[test]
    fn test_routes_obd_response() {
        let updates = FrameCodec::decode(&frame(0x7E8, &[0x03, 0x41, 0x0D, 42]));
        assert_eq!(updates, vec![FieldUpdate::Speed(42)]);

        let updates = FrameCodec::decode(&frame(0x18DAF110, &[0x03, 0x41, 0x5B, 255]));
        assert_eq!(updates, vec![FieldUpdate::StateOfCharge(100)]);
    }

    #[test]
    fn test_routes_uds_response() {
        let updates = FrameCodec::decode(&frame(
            ids::BECM_RECV_ID,
            &[0x07, 0x62, 0x49, 0x6D, 0xFA, 0x23, 0x00, 0x00],
        ));
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], FieldUpdate::StateOfHealth(v) if (v - 92.1).abs() < 1e-9));
    }

    #[test]
    fn test_routes_broadcast() {
        let updates = FrameCodec::decode(&frame(ids::GEAR_ID, &[0, 0, 0, 0, 0, 0, 3, 0]));
        assert_eq!(updates, vec![FieldUpdate::Gear(Gear::Drive)]);
    }

    #[test]
    fn test_uds_payload_on_wrong_id_ignored() {
        // A SOH-shaped payload only counts on the tester address
        let updates = FrameCodec::decode(&frame(0x7E8, &[0x07, 0x62, 0x49, 0x6D, 1, 2, 3, 4]));
        assert!(updates.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        for id in [0x000, 0x123, 0x7DF, 0x7E0, 0x18DB33F1, 0x1FFF0000, 0x1FFFFFFF] {
            assert!(FrameCodec::decode(&frame(id, &[0x03, 0x41, 0x0D, 1, 2, 3, 4, 5])).is_empty());
        }
    }

    #[test]
    fn test_rtr_frames_ignored() {
        let rtr = frame(0x7E8, &[0x03, 0x41, 0x0D, 42]).rtr(true);
        assert!(FrameCodec::decode(&rtr).is_empty());
    }

    #[test]
    fn test_decode_payload_vin() {
        let mut payload = vec![0x49, 0x02, 0x01];
        payload.extend_from_slice(b"LPSVSEDEEML123456");
        assert_eq!(
            FrameCodec::decode_payload(0x7E8, &payload),
            vec![FieldUpdate::Vin("LPSVSEDEEML123456".to_string())]
        );
        assert!(FrameCodec::decode_payload(0x123, &payload).is_empty());
    }
}
