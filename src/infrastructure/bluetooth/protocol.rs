//! Nano IMU Wire Protocol
//!
//! Constants shared with the peripheral firmware and the decoder for the
//! fixed-layout telemetry frame.

use crate::domain::error::ClientError;
use crate::domain::models::TelemetrySample;
use anyhow::Result;

/// IMU notification characteristic UUID.
/// Must match the peripheral firmware exactly.
pub const IMU_CHAR_UUID: &str = "13012F01-F8C3-4F4A-A8F4-15CD926DA146";

/// Name substring advertised by the peripheral
pub const DEVICE_NAME_FILTER: &str = "Arduino Nano 33 BLE Sense";

/// Size of one telemetry frame in bytes
pub const FRAME_LEN: usize = 28;

/// Decode one 28-byte telemetry frame
///
/// # Frame Structure (28 bytes, little-endian)
///
/// ```text
/// [0-3]   : Timestamp (u32, microseconds)
/// [4-7]   : Accel X (f32)
/// [8-11]  : Accel Y (f32)
/// [12-15] : Accel Z (f32)
/// [16-19] : Gyro X (f32)
/// [20-23] : Gyro Y (f32)
/// [24-27] : Gyro Z (f32)
/// ```
///
/// Values are not range-checked: NaN and garbage floats pass through.
pub fn decode_frame(bytes: &[u8]) -> Result<TelemetrySample, ClientError> {
    let frame = <&[u8; FRAME_LEN]>::try_from(bytes).map_err(|_| ClientError::MalformedFrame {
        expected: FRAME_LEN,
        actual: bytes.len(),
    })?;

    let word = |offset: usize| {
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    };
    let float = |offset: usize| f32::from_le_bytes(word(offset));

    Ok(TelemetrySample {
        timestamp_micros: u32::from_le_bytes(word(0)),
        accel: [float(4), float(8), float(12)],
        gyro: [float(16), float(20), float(24)],
    })
}

/// Encode a sample the way the firmware does
#[cfg(test)]
pub fn encode_frame(sample: &TelemetrySample) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..4].copy_from_slice(&sample.timestamp_micros.to_le_bytes());
    for (i, value) in sample.accel.iter().chain(sample.gyro.iter()).enumerate() {
        let offset = 4 + i * 4;
        frame[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    frame
}

/// Parse a UUID string ("13012F01-F8C3-...") into its 128-bit value
pub fn parse_uuid(uuid_str: &str) -> Result<u128> {
    let hex = uuid_str.replace('-', "");

    if hex.len() != 32 {
        return Err(anyhow::anyhow!("Invalid UUID format: {}", uuid_str));
    }

    Ok(u128::from_str_radix(&hex, 16)?)
}

/// Whether two UUID strings name the same characteristic
pub fn same_uuid(a: &str, b: &str) -> bool {
    match (parse_uuid(a), parse_uuid(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Format a 48-bit Bluetooth address as `AA:BB:CC:DD:EE:FF`
pub fn format_address(address: u64) -> String {
    (0..6)
        .rev()
        .map(|i| format!("{:02X}", (address >> (i * 8)) & 0xFF))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse `AA:BB:CC:DD:EE:FF` (or bare hex) into a Bluetooth address
pub fn parse_address(text: &str) -> Result<u64> {
    let hex: String = text.chars().filter(|c| *c != ':' && *c != '-').collect();
    if hex.is_empty() || hex.len() > 12 {
        return Err(anyhow::anyhow!("Invalid Bluetooth address: {}", text));
    }
    Ok(u64::from_str_radix(&hex, 16)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_frame() -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_LEN);
        bytes.extend_from_slice(&123_456u32.to_le_bytes());
        for v in [0.5f32, -1.25, 9.81, 100.0, -250.5, 0.001] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_known_frame() {
        let sample = decode_frame(&known_frame()).unwrap();
        assert_eq!(sample.timestamp_micros, 123_456);
        assert_eq!(sample.accel, [0.5, -1.25, 9.81]);
        assert_eq!(sample.gyro, [100.0, -250.5, 0.001]);
    }

    #[test]
    fn test_decode_literal_bytes() {
        // timestamp 1000 (0x3E8), ax = 1.0 (0x3F800000), everything else zero
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = 0xE8;
        bytes[1] = 0x03;
        bytes[7] = 0x3F;
        bytes[6] = 0x80;

        let sample = decode_frame(&bytes).unwrap();
        assert_eq!(sample.timestamp_micros, 1000);
        assert_eq!(sample.accel, [1.0, 0.0, 0.0]);
        assert_eq!(sample.gyro, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decode_rejects_wrong_lengths() {
        let frame = known_frame();
        for len in [0, 1, 4, 27] {
            match decode_frame(&frame[..len]) {
                Err(ClientError::MalformedFrame { expected, actual }) => {
                    assert_eq!(expected, FRAME_LEN);
                    assert_eq!(actual, len);
                }
                other => panic!("expected MalformedFrame for {} bytes, got {:?}", len, other),
            }
        }

        let mut long = frame.clone();
        long.push(0);
        assert!(matches!(
            decode_frame(&long),
            Err(ClientError::MalformedFrame { actual: 29, .. })
        ));
        assert!(matches!(
            decode_frame(&[0u8; 60]),
            Err(ClientError::MalformedFrame { actual: 60, .. })
        ));
    }

    #[test]
    fn test_decode_passes_nan_through() {
        let mut bytes = known_frame();
        bytes[16..20].copy_from_slice(&f32::NAN.to_le_bytes());
        bytes[4..8].copy_from_slice(&f32::INFINITY.to_le_bytes());

        let sample = decode_frame(&bytes).unwrap();
        assert!(sample.gyro[0].is_nan());
        assert_eq!(sample.accel[0], f32::INFINITY);
    }

    #[test]
    fn test_encode_matches_wire_layout() {
        let sample = decode_frame(&known_frame()).unwrap();
        assert_eq!(encode_frame(&sample).to_vec(), known_frame());
    }

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid(IMU_CHAR_UUID).unwrap();
        assert_eq!(uuid >> 96, 0x13012F01);
        assert!(parse_uuid("13012F01").is_err());
        assert!(parse_uuid("ZZ012F01-F8C3-4F4A-A8F4-15CD926DA146").is_err());
    }

    #[test]
    fn test_same_uuid_ignores_case() {
        assert!(same_uuid(IMU_CHAR_UUID, &IMU_CHAR_UUID.to_lowercase()));
        assert!(!same_uuid(IMU_CHAR_UUID, "13012F02-F8C3-4F4A-A8F4-15CD926DA146"));
        assert!(!same_uuid(IMU_CHAR_UUID, "not-a-uuid"));
    }

    #[test]
    fn test_address_formatting() {
        assert_eq!(format_address(0xA1B2C3D4E5F6), "A1:B2:C3:D4:E5:F6");
        assert_eq!(format_address(0x01), "00:00:00:00:00:01");
        assert_eq!(parse_address("A1:B2:C3:D4:E5:F6").unwrap(), 0xA1B2C3D4E5F6);
        assert_eq!(parse_address("a1b2c3d4e5f6").unwrap(), 0xA1B2C3D4E5F6);
        assert!(parse_address("").is_err());
        assert!(parse_address("A1:B2:C3:D4:E5:F6:07").is_err());
    }
}
