//! UDS ReadDataByIdentifier (0x22) support for the battery State-of-Health DID

use byteorder::{ByteOrder, LittleEndian};

use crate::types::FieldUpdate;

/// ReadDataByIdentifier request service
pub const SID_READ_DATA_BY_IDENTIFIER: u8 = 0x22;
/// Positive response to ReadDataByIdentifier
pub const SID_READ_DATA_BY_IDENTIFIER_RESPONSE: u8 = 0x62;
/// DID holding battery SOH in hundredths of a percent
pub const DID_STATE_OF_HEALTH: u16 = 0x496D;

/// Build a zero-padded single-frame ReadDataByIdentifier request
pub fn read_did_request(did: u16) -> [u8; 8] {
    let [hi, lo] = did.to_be_bytes();
    [3, SID_READ_DATA_BY_IDENTIFIER, hi, lo, 0, 0, 0, 0]
}

/// Decode the SOH percentage from a `[len, 0x62, 0x49, 0x6D, b0, b1, b2, b3]` frame
///
/// The four value bytes are a little-endian u32 in 0.01 % units. Vehicles
/// report the length nibble either as the value byte count (`04`) or as the
/// full single-frame length (`07`), so only the single-frame PCI is checked.
pub fn decode_state_of_health(data: &[u8]) -> Option<f64> {
    if data.len() < 8 {
        return None;
    }

    let [did_hi, did_lo] = DID_STATE_OF_HEALTH.to_be_bytes();
    let well_formed = data[0] & 0xF0 == 0
        && data[1] == SID_READ_DATA_BY_IDENTIFIER_RESPONSE
        && data[2] == did_hi
        && data[3] == did_lo;
    if !well_formed {
        return None;
    }

    let raw = LittleEndian::read_u32(&data[4..8]);
    Some(raw as f64 / 100.0)
}

/// Decode a frame received on the diagnostic tester address
pub fn decode(data: &[u8]) -> Vec<FieldUpdate> {
    decode_state_of_health(data)
        .map(FieldUpdate::StateOfHealth)
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soh_frame(raw: u32) -> [u8; 8] {
        let v = raw.to_le_bytes();
        [0x07, 0x62, 0x49, 0x6D, v[0], v[1], v[2], v[3]]
    }

    #[test]
    fn test_read_did_request() {
        assert_eq!(
            read_did_request(DID_STATE_OF_HEALTH),
            [0x03, 0x22, 0x49, 0x6D, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_decode_soh() {
        let value = decode_state_of_health(&soh_frame(9210)).unwrap();
        assert!((value - 92.10).abs() < 1e-9);

        assert_eq!(decode_state_of_health(&soh_frame(10000)), Some(100.0));
    }

    #[test]
    fn test_decode_soh_little_endian() {
        // 9210 = 0x000023FA
        let frame = [0x07, 0x62, 0x49, 0x6D, 0xFA, 0x23, 0x00, 0x00];
        assert!((decode_state_of_health(&frame).unwrap() - 92.10).abs() < 1e-9);
    }

    #[test]
    fn test_decode_soh_value_count_length_byte() {
        let frame = [0x04, 0x62, 0x49, 0x6D, 0xFA, 0x23, 0x00, 0x00];
        assert!((decode_state_of_health(&frame).unwrap() - 92.10).abs() < 1e-9);
        assert_eq!(decode(&frame).len(), 1);
    }

    #[test]
    fn test_decode_soh_rejects_other_responses() {
        // Wrong DID
        assert!(decode(&[0x07, 0x62, 0xF1, 0x90, 1, 2, 3, 4]).is_empty());
        // Negative response
        assert!(decode(&[0x03, 0x7F, 0x22, 0x31, 0, 0, 0, 0]).is_empty());
        // First frame of a multi-frame response
        assert!(decode(&[0x10, 0x62, 0x49, 0x6D, 1, 2, 3, 4]).is_empty());
        // Truncated
        assert!(decode(&[0x07, 0x62, 0x49, 0x6D, 1, 2]).is_empty());
    }
}
