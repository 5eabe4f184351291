//! # Register Reader
//!
//! Issues one "read holding register" transaction at a time and retries on
//! failure. Every attempt follows the same sequence:
//!
//! 1. flush the transport's input and output buffers
//! 2. wait the settle delay so line noise subsides
//! 3. send the request frame (register count 1)
//! 4. wait the inter-frame delay
//! 5. read up to 7 bytes within the read timeout and parse them
//!
//! A failed attempt is followed by the retry backoff. When the last attempt
//! fails the reader returns `None`: a missing value is an expected outcome on
//! a noisy bus, not an error.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::codec::{build_read_request, format_hex, parse_read_response, verify_response_crc};
use crate::config::{SensorConfig, Timing};
use crate::constants::SINGLE_REGISTER_RESPONSE_LEN;
use crate::error::{SensorError, SensorResult};
use crate::transport::SensorTransport;

/// Transaction counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Log a frame with its direction
fn log_packet(direction: &str, data: &[u8], slave: u8) {
    debug!("[MODBUS-RTU] {} slave:{} {}", direction, slave, format_hex(data));
}

/// Reads single holding registers from one sensor.
///
/// The reader owns its transport, so `&mut self` on every read keeps exactly
/// one transaction in flight on the bus.
pub struct RegisterReader<T: SensorTransport> {
    transport: T,
    slave_address: u8,
    read_timeout: Duration,
    max_attempts: u8,
    timing: Timing,
    verify_crc: bool,
    packet_logging: bool,
    stats: ReaderStats,
}

impl<T: SensorTransport> RegisterReader<T> {
    /// Create a reader with the link settings from `config`.
    pub fn new(transport: T, config: &SensorConfig) -> Self {
        Self {
            transport,
            slave_address: config.slave_address,
            read_timeout: config.read_timeout(),
            max_attempts: config.max_attempts,
            timing: config.timing,
            verify_crc: config.verify_crc,
            packet_logging: config.packet_logging,
            stats: ReaderStats::default(),
        }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// Read one register with the configured number of attempts.
    pub async fn read(&mut self, address: u16, scale: f64) -> Option<f64> {
        self.read_register(address, scale, self.max_attempts).await
    }

    /// Read one register and return `raw × scale`, or `None` once
    /// `max_attempts` consecutive attempts have failed.
    pub async fn read_register(&mut self, address: u16, scale: f64, max_attempts: u8) -> Option<f64> {
        for attempt in 1..=max_attempts {
            match self.transact(address).await {
                Ok(raw) => return Some(f64::from(raw) * scale),
                Err(e) if attempt < max_attempts => {
                    debug!(
                        "Register 0x{:04X} attempt {}/{} failed: {}",
                        address, attempt, max_attempts, e
                    );
                    sleep(self.timing.retry_backoff()).await;
                }
                Err(e) => {
                    warn!(
                        "Failed to read register 0x{:04X} after {} attempt(s): {}",
                        address, attempt, e
                    );
                    return None;
                }
            }
        }
        None
    }

    /// Run a single request/response transaction and return the raw value.
    pub async fn transact(&mut self, address: u16) -> SensorResult<u16> {
        let result = self.exchange(address).await;
        match &result {
            Ok(_) => self.stats.responses_received += 1,
            Err(e) => {
                self.stats.errors += 1;
                if e.is_timeout() {
                    self.stats.timeouts += 1;
                }
            }
        }
        result
    }

    async fn exchange(&mut self, address: u16) -> SensorResult<u16> {
        self.transport.reset_input_buffer()?;
        self.transport.reset_output_buffer()?;
        sleep(self.timing.settle_delay()).await;

        let request = build_read_request(self.slave_address, address, 1);
        if self.packet_logging {
            log_packet("send", &request, self.slave_address);
        }
        self.transport.write(&request).await?;
        self.stats.requests_sent += 1;
        self.stats.bytes_sent += request.len() as u64;

        sleep(self.timing.inter_frame_delay()).await;

        let response = self
            .transport
            .read(SINGLE_REGISTER_RESPONSE_LEN, self.read_timeout)
            .await?;
        self.stats.bytes_received += response.len() as u64;
        if self.packet_logging {
            log_packet("receive", &response, self.slave_address);
        }

        if response.is_empty() {
            return Err(SensorError::timeout(
                format!("read register 0x{:04X}", address),
                u64::try_from(self.read_timeout.as_millis()).unwrap_or(u64::MAX),
            ));
        }

        let raw = parse_read_response(&response, self.slave_address)?;
        if self.verify_crc {
            verify_response_crc(&response)?;
        }
        Ok(raw)
    }
}
