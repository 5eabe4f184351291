//! Error types for sensor communication and persistence
//!
//! Any error raised during a register transaction is retried by the register
//! reader and degrades to an absent value once attempts run out. Only setup
//! failures (the port cannot be opened), persistence I/O and configuration
//! errors are expected to reach the caller.

use thiserror::Error;

/// Result type used across the crate
pub type SensorResult<T> = Result<T, SensorError>;

/// Errors raised while talking to the sensor or storing its readings
#[derive(Debug, Error)]
pub enum SensorError {
    /// The byte channel is unavailable, closed, or failed an I/O call
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Response has the wrong length, slave address or function code
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Device answered with a Modbus exception frame
    #[error("Modbus exception: function=0x{function:02X}, code=0x{code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// No response within the read window
    #[error("Timeout: {operation} after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Response CRC does not match its payload (strict CRC mode only)
    #[error("CRC mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch { expected: u16, received: u16 },

    /// Nutrient fallback search found no positive value
    #[error("No plausible value for {nutrient}")]
    NoPlausibleValue { nutrient: String },

    /// The scheduled sampler task is no longer running
    #[error("Sampler worker stopped")]
    WorkerStopped,

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SensorError {
    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SensorError::timeout("read register 0x0015", 2000);
        assert_eq!(err.to_string(), "Timeout: read register 0x0015 after 2000ms");

        let err = SensorError::ChecksumMismatch {
            expected: 0x1234,
            received: 0xABCD,
        };
        assert_eq!(
            err.to_string(),
            "CRC mismatch: expected 0x1234, received 0xABCD"
        );
    }

    #[test]
    fn test_timeout_classification() {
        assert!(SensorError::timeout("read", 10).is_timeout());
        assert!(!SensorError::transport("port closed").is_timeout());

        let io = SensorError::from(std::io::Error::other("disk full"));
        assert!(matches!(io, SensorError::Io(_)));
        assert!(!io.is_timeout());
    }
}
