//! Modbus RTU and sensor protocol constants
//!
//! Frame sizes follow the Modbus RTU ADU layout used by the soil sensor:
//! - Request: Slave(1) + FC(1) + Address(2) + Quantity(2) + CRC(2)
//! - Single-register response: Slave(1) + FC(1) + ByteCount(1) + Value(2) + CRC(2)

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Length of a read holding registers request frame (with CRC)
pub const READ_REQUEST_LEN: usize = 8;

/// Length of a single-register read response frame (with CRC)
///
/// This is also the number of bytes requested from the transport per read.
pub const SINGLE_REGISTER_RESPONSE_LEN: usize = 7;

/// Number of CRC bytes trailing every RTU frame
pub const CRC_LEN: usize = 2;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Bit set in the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

// ============================================================================
// Sensor Defaults
// ============================================================================

/// Factory baud rate of the 7-in-1 soil sensor
pub const DEFAULT_BAUD_RATE: u32 = 4800;

/// Factory slave address
pub const DEFAULT_SLAVE_ADDRESS: u8 = 1;

/// Highest assignable slave address on a Modbus RTU bus
pub const MAX_SLAVE_ADDRESS: u8 = 247;

/// Serial read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;

/// Attempts per register read before giving up
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Delay after flushing buffers, lets line noise subside
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Delay between sending a request and reading the response
pub const DEFAULT_INTER_FRAME_DELAY_MS: u64 = 100;

/// Delay before retrying a failed read
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Delay between consecutive parameters in one acquisition cycle
pub const DEFAULT_PACING_DELAY_MS: u64 = 300;

/// Scale factors tried, in order, by the nutrient fallback search
pub const DEFAULT_FALLBACK_SCALES: [f64; 3] = [0.1, 1.0, 10.0];

/// Tick interval of continuous and averaging modes in milliseconds
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10_000;

/// Samples collected by averaging mode
pub const DEFAULT_AVERAGE_SAMPLES: usize = 10;

/// Base file name for single readings and averages
pub const DEFAULT_SINGLE_BASE: &str = "dados_sensor_solo";

/// Base file name for continuous sessions
pub const DEFAULT_CONTINUOUS_BASE: &str = "dados_sensor_solo_continuo";

/// Get a human-readable description of a Modbus exception code
pub fn exception_description(code: u8) -> &'static str {
    match code {
        EXCEPTION_ILLEGAL_FUNCTION => "Illegal Function",
        EXCEPTION_ILLEGAL_DATA_ADDRESS => "Illegal Data Address",
        EXCEPTION_ILLEGAL_DATA_VALUE => "Illegal Data Value",
        EXCEPTION_SERVER_DEVICE_FAILURE => "Server Device Failure",
        EXCEPTION_ACKNOWLEDGE => "Acknowledge",
        EXCEPTION_SERVER_DEVICE_BUSY => "Server Device Busy",
        _ => "Unknown Exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(READ_REQUEST_LEN, 1 + 1 + 2 + 2 + CRC_LEN);
        assert_eq!(SINGLE_REGISTER_RESPONSE_LEN, 1 + 1 + 1 + 2 + CRC_LEN);
    }

    #[test]
    fn test_fallback_scales_are_ordered_and_positive() {
        assert!(DEFAULT_FALLBACK_SCALES.iter().all(|s| *s > 0.0));
        assert!(DEFAULT_FALLBACK_SCALES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_exception_description() {
        assert_eq!(exception_description(0x02), "Illegal Data Address");
        assert_eq!(exception_description(0x7F), "Unknown Exception");
    }
}
