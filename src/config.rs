//! # Sensor Configuration
//!
//! Serial link parameters, protocol timing, register map, sampling cadence
//! and output locations. Every field has the sensor's factory default, so a
//! JSON configuration file only needs to list what differs:
//!
//! ```json
//! {
//!   "port": "/dev/ttyUSB0",
//!   "baud_rate": 9600,
//!   "timing": { "retry_backoff_ms": 250 },
//!   "output": { "directory": "/var/lib/soil" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AVERAGE_SAMPLES, DEFAULT_BAUD_RATE, DEFAULT_CONTINUOUS_BASE,
    DEFAULT_FALLBACK_SCALES, DEFAULT_INTER_FRAME_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_PACING_DELAY_MS, DEFAULT_READ_TIMEOUT_MS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_SINGLE_BASE,
    DEFAULT_SLAVE_ADDRESS, MAX_SLAVE_ADDRESS,
};
use crate::error::{SensorError, SensorResult};
use crate::registers::RegisterMap;

/// Fixed delays around each Modbus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Wait after flushing buffers, before sending (milliseconds).
    pub settle_delay_ms: u64,
    /// Wait between sending the request and reading the response (milliseconds).
    pub inter_frame_delay_ms: u64,
    /// Wait before retrying a failed attempt (milliseconds).
    pub retry_backoff_ms: u64,
    /// Wait between parameters of one acquisition cycle (milliseconds).
    pub pacing_delay_ms: u64,
}

impl Timing {
    /// All delays set to zero. Useful against simulated sensors.
    pub const fn immediate() -> Self {
        Self {
            settle_delay_ms: 0,
            inter_frame_delay_ms: 0,
            retry_backoff_ms: 0,
            pacing_delay_ms: 0,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn inter_frame_delay(&self) -> Duration {
        Duration::from_millis(self.inter_frame_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            inter_frame_delay_ms: DEFAULT_INTER_FRAME_DELAY_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            pacing_delay_ms: DEFAULT_PACING_DELAY_MS,
        }
    }
}

/// Cadence of the continuous and averaging modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Interval between scheduled acquisitions (milliseconds).
    pub interval_ms: u64,
    /// Samples collected before an average is computed.
    pub average_samples: usize,
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            average_samples: DEFAULT_AVERAGE_SAMPLES,
        }
    }
}

/// Where and under which base names records are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Base name for single readings and averages
    pub single_base: String,
    /// Base name for continuous sessions
    pub continuous_base: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            single_base: DEFAULT_SINGLE_BASE.to_string(),
            continuous_base: DEFAULT_CONTINUOUS_BASE.to_string(),
        }
    }
}

/// Complete configuration of one sensor on one serial line.
///
/// # Example
///
/// ```rust
/// use soil_probe::config::SensorConfig;
///
/// let config = SensorConfig::new("/dev/ttyUSB0")
///     .with_baud_rate(9600)
///     .with_slave_address(3)
///     .with_verify_crc(true);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Serial device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: String,
    pub baud_rate: u32,
    pub slave_address: u8,
    /// Transport read timeout (milliseconds).
    pub read_timeout_ms: u64,
    /// Attempts per register read.
    pub max_attempts: u8,
    /// Reject responses whose CRC does not match. Off by default.
    pub verify_crc: bool,
    /// Log every frame sent and received at debug level.
    pub packet_logging: bool,
    pub timing: Timing,
    /// Scale factors tried by the nutrient fallback search, in order.
    pub fallback_scales: Vec<f64>,
    pub registers: RegisterMap,
    pub sampling: SamplingConfig,
    pub output: OutputConfig,
}

impl SensorConfig {
    /// Default configuration for the given serial port.
    pub fn new<S: Into<String>>(port: S) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SensorResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_slave_address(mut self, slave_address: u8) -> Self {
        self.slave_address = slave_address;
        self
    }

    pub fn with_read_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_verify_crc(mut self, enabled: bool) -> Self {
        self.verify_crc = enabled;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_registers(mut self, registers: RegisterMap) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_fallback_scales(mut self, scales: Vec<f64>) -> Self {
        self.fallback_scales = scales;
        self
    }

    pub fn with_output_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.output.directory = directory.into();
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Reject values the protocol layer cannot work with.
    pub fn validate(&self) -> SensorResult<()> {
        if self.baud_rate == 0 {
            return Err(SensorError::config("baud rate must be non-zero"));
        }
        if !(1..=MAX_SLAVE_ADDRESS).contains(&self.slave_address) {
            return Err(SensorError::config(format!(
                "slave address must be in 1..={}, got {}",
                MAX_SLAVE_ADDRESS, self.slave_address
            )));
        }
        if self.max_attempts == 0 {
            return Err(SensorError::config("max_attempts must be at least 1"));
        }
        if let Some(bad) = self
            .fallback_scales
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(SensorError::config(format!(
                "fallback scale factors must be positive, got {}",
                bad
            )));
        }
        if self.sampling.average_samples == 0 {
            return Err(SensorError::config("average_samples must be at least 1"));
        }
        self.registers.validate()
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            slave_address: DEFAULT_SLAVE_ADDRESS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            verify_crc: false,
            packet_logging: false,
            timing: Timing::default(),
            fallback_scales: DEFAULT_FALLBACK_SCALES.to_vec(),
            registers: RegisterMap::default(),
            sampling: SamplingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sensor_factory_settings() {
        let config = SensorConfig::default();
        assert_eq!(config.baud_rate, 4800);
        assert_eq!(config.slave_address, 1);
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_attempts, 3);
        assert!(!config.verify_crc);
        assert_eq!(config.timing.settle_delay(), Duration::from_millis(200));
        assert_eq!(config.timing.inter_frame_delay(), Duration::from_millis(100));
        assert_eq!(config.timing.retry_backoff(), Duration::from_millis(500));
        assert_eq!(config.timing.pacing_delay(), Duration::from_millis(300));
        assert_eq!(config.fallback_scales, vec![0.1, 1.0, 10.0]);
        assert_eq!(config.sampling.interval(), Duration::from_secs(10));
        assert_eq!(config.sampling.average_samples, 10);
    }

    #[test]
    fn test_validate() {
        assert!(SensorConfig::new("/dev/ttyUSB0").validate().is_ok());
        assert!(SensorConfig::default().with_slave_address(0).validate().is_err());
        assert!(SensorConfig::default().with_slave_address(248).validate().is_err());
        assert!(SensorConfig::default().with_max_attempts(0).validate().is_err());
        assert!(SensorConfig::default().with_baud_rate(0).validate().is_err());
        assert!(SensorConfig::default()
            .with_fallback_scales(vec![1.0, -10.0])
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SensorConfig = serde_json::from_str(
            r#"{"port": "COM3", "baud_rate": 9600, "timing": {"retry_backoff_ms": 250}}"#,
        )
        .unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timing.retry_backoff_ms, 250);
        assert_eq!(config.timing.settle_delay_ms, 200);
        assert_eq!(config.output.single_base, "dados_sensor_solo");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.json");
        std::fs::write(&path, r#"{"slave_address": 5, "verify_crc": true}"#).unwrap();

        let config = SensorConfig::from_file(&path).unwrap();
        assert_eq!(config.slave_address, 5);
        assert!(config.verify_crc);

        std::fs::write(&path, r#"{"max_attempts": 0}"#).unwrap();
        assert!(matches!(
            SensorConfig::from_file(&path),
            Err(SensorError::Config { .. })
        ));
    }
}
