//! # Frame Codec
//!
//! Builds Modbus RTU "read holding registers" request frames and parses the
//! single-register responses returned by the soil sensor.
//!
//! ## Frame Layout
//!
//! | Frame | Bytes |
//! |-------|-------|
//! | Request | `slave, 0x03, addrHi, addrLo, countHi, countLo, crcLo, crcHi` |
//! | Response | `slave, 0x03, byteCount, valueHi, valueLo, crcLo, crcHi` |
//!
//! The CRC is CRC-16/Modbus (seed `0xFFFF`, reflected polynomial `0xA001`),
//! transmitted little-endian.
//!
//! Response parsing validates structure only. The trailing CRC is checked by
//! [`verify_response_crc`], which the register reader calls only when strict
//! CRC mode is enabled.

use crc::{Crc, CRC_16_MODBUS};

use crate::constants::{
    exception_description, CRC_LEN, EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, READ_REQUEST_LEN,
    SINGLE_REGISTER_RESPONSE_LEN,
};
use crate::error::{SensorError, SensorResult};

/// CRC calculator for RTU frames
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the CRC-16/Modbus register over `data`.
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Compute the CRC-16/Modbus of `data` in wire order (low byte first).
///
/// # Example
///
/// ```rust
/// use soil_probe::codec::checksum;
///
/// assert_eq!(checksum(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), [0x84, 0x0A]);
/// ```
#[inline]
pub fn checksum(data: &[u8]) -> [u8; 2] {
    crc16(data).to_le_bytes()
}

/// Build a read holding registers (FC03) request frame.
///
/// # Arguments
/// * `slave` - Bus address of the sensor
/// * `register` - Holding register address
/// * `count` - Number of registers to read (the sensor layer always uses 1)
pub fn build_read_request(slave: u8, register: u16, count: u16) -> [u8; READ_REQUEST_LEN] {
    let [addr_hi, addr_lo] = register.to_be_bytes();
    let [count_hi, count_lo] = count.to_be_bytes();

    let mut frame = [
        slave,
        FC_READ_HOLDING_REGISTERS,
        addr_hi,
        addr_lo,
        count_hi,
        count_lo,
        0,
        0,
    ];
    let crc = checksum(&frame[..READ_REQUEST_LEN - CRC_LEN]);
    frame[READ_REQUEST_LEN - CRC_LEN..].copy_from_slice(&crc);
    frame
}

/// Parse a single-register read response and return the raw register value.
///
/// Accepts a frame of at least 7 bytes whose first byte is `expected_slave`
/// and whose function code is `0x03`. The value is taken from bytes 3 and 4
/// (big-endian). The byte count and CRC are not checked here.
///
/// # Errors
/// * [`SensorError::Exception`] - the device answered with an exception frame
/// * [`SensorError::MalformedResponse`] - any other shape
pub fn parse_read_response(frame: &[u8], expected_slave: u8) -> SensorResult<u16> {
    if frame.is_empty() {
        return Err(SensorError::malformed("empty response"));
    }

    if frame.len() >= 3 && frame[0] == expected_slave && frame[1] & EXCEPTION_FLAG != 0 {
        let code = frame[2];
        return Err(SensorError::Exception {
            function: frame[1] & !EXCEPTION_FLAG,
            code,
            message: exception_description(code).to_string(),
        });
    }

    if frame.len() < SINGLE_REGISTER_RESPONSE_LEN {
        return Err(SensorError::malformed(format!(
            "response too short: {} bytes (need {}): {}",
            frame.len(),
            SINGLE_REGISTER_RESPONSE_LEN,
            format_hex(frame)
        )));
    }

    if frame[0] != expected_slave {
        return Err(SensorError::malformed(format!(
            "slave address mismatch: expected {}, got {}",
            expected_slave, frame[0]
        )));
    }

    if frame[1] != FC_READ_HOLDING_REGISTERS {
        return Err(SensorError::malformed(format!(
            "function code mismatch: expected 0x{:02X}, got 0x{:02X}",
            FC_READ_HOLDING_REGISTERS, frame[1]
        )));
    }

    Ok(u16::from_be_bytes([frame[3], frame[4]]))
}

/// Verify the CRC trailer of a single-register response.
///
/// Only the first 7 bytes are considered; anything after them is ignored.
pub fn verify_response_crc(frame: &[u8]) -> SensorResult<()> {
    if frame.len() < SINGLE_REGISTER_RESPONSE_LEN {
        return Err(SensorError::malformed(format!(
            "response too short for CRC check: {} bytes",
            frame.len()
        )));
    }

    let data_len = SINGLE_REGISTER_RESPONSE_LEN - CRC_LEN;
    let received = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);
    let expected = crc16(&frame[..data_len]);
    if received != expected {
        return Err(SensorError::ChecksumMismatch { expected, received });
    }
    Ok(())
}

/// Build a well-formed single-register response frame.
///
/// Used by the simulated sensor and by tests.
pub fn build_read_response(slave: u8, value: u16) -> [u8; SINGLE_REGISTER_RESPONSE_LEN] {
    let [hi, lo] = value.to_be_bytes();
    let mut frame = [slave, FC_READ_HOLDING_REGISTERS, 2, hi, lo, 0, 0];
    let crc = checksum(&frame[..SINGLE_REGISTER_RESPONSE_LEN - CRC_LEN]);
    frame[SINGLE_REGISTER_RESPONSE_LEN - CRC_LEN..].copy_from_slice(&crc);
    frame
}

/// Format raw bytes as a hex string for packet logging
pub fn format_hex(data: &[u8]) -> String {
    if data.is_empty() {
        return "<empty>".to_string();
    }
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_checksum_known_vectors() {
        assert_eq!(checksum(&[0x01, 0x03, 0x00, 0x15, 0x00, 0x01]), [0x95, 0xCE]);
        assert_eq!(checksum(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), [0x84, 0x0A]);
        assert_eq!(crc16(&[0x01, 0x03, 0x02, 0x00, 0x2A]), 0x9B39);
    }

    #[test]
    fn test_checksum_empty_is_seed() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_build_read_request() {
        let frame = build_read_request(1, 0x0015, 1);
        assert_eq!(frame, [0x01, 0x03, 0x00, 0x15, 0x00, 0x01, 0x95, 0xCE]);
        assert_eq!(frame[6..], checksum(&frame[..6]));
    }

    #[test]
    fn test_build_read_request_high_address() {
        let frame = build_read_request(0x0A, 0x1234, 0x0002);
        assert_eq!(&frame[..6], &[0x0A, 0x03, 0x12, 0x34, 0x00, 0x02]);
    }

    #[test]
    fn test_parse_accepts_well_formed_response() {
        let frame = [0x01, 0x03, 0x02, 0x01, 0x02, 0x38, 0x15];
        assert_eq!(parse_read_response(&frame, 1).unwrap(), 0x0102);
    }

    #[test]
    fn test_parse_accepts_trailing_bytes() {
        let mut frame = build_read_response(1, 42).to_vec();
        frame.push(0xFF);
        assert_eq!(parse_read_response(&frame, 1).unwrap(), 42);
    }

    #[test]
    fn test_parse_rejects_short_response() {
        let err = parse_read_response(&[0x01, 0x03, 0x02, 0x00, 0x2A, 0x39], 1).unwrap_err();
        assert!(matches!(err, SensorError::MalformedResponse { .. }));

        let err = parse_read_response(&[], 1).unwrap_err();
        assert!(matches!(err, SensorError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_slave() {
        let frame = build_read_response(2, 42);
        let err = parse_read_response(&frame, 1).unwrap_err();
        assert!(matches!(err, SensorError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_function_code() {
        let mut frame = build_read_response(1, 42);
        frame[1] = 0x04;
        let err = parse_read_response(&frame, 1).unwrap_err();
        assert!(matches!(err, SensorError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_reports_exception_frame() {
        let mut frame = vec![0x01, 0x83, 0x02];
        frame.extend_from_slice(&checksum(&frame));
        match parse_read_response(&frame, 1).unwrap_err() {
            SensorError::Exception { function, code, .. } => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x02);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_ignores_crc_by_default() {
        let mut frame = build_read_response(1, 42);
        frame[5] ^= 0xFF;
        assert_eq!(parse_read_response(&frame, 1).unwrap(), 42);
        assert!(matches!(
            verify_response_crc(&frame),
            Err(SensorError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_response_crc() {
        assert!(verify_response_crc(&build_read_response(1, 0x1234)).is_ok());
        assert!(verify_response_crc(&[0x01, 0x03]).is_err());
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x01, 0xAB]), "01 AB");
        assert_eq!(format_hex(&[]), "<empty>");
    }

    proptest! {
        #[test]
        fn prop_request_trailer_is_crc_of_body(slave in 1u8..=247, register in any::<u16>(), count in 1u16..=125) {
            let frame = build_read_request(slave, register, count);
            prop_assert_eq!(frame[6..].to_vec(), checksum(&frame[..6]).to_vec());
            prop_assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), register);
        }

        #[test]
        fn prop_response_value_survives_parse(slave in 1u8..=247, value in any::<u16>()) {
            let frame = build_read_response(slave, value);
            prop_assert_eq!(parse_read_response(&frame, slave).unwrap(), value);
            prop_assert!(verify_response_crc(&frame).is_ok());
        }

        #[test]
        fn prop_parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..16), slave in any::<u8>()) {
            let _ = parse_read_response(&bytes, slave);
        }
    }
}
