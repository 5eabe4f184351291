//! # Transport Layer
//!
//! The sensor speaks Modbus RTU over a half-duplex RS-485 line. The core only
//! needs an open duplex byte channel; opening it (device discovery, USB
//! permissions, serial parameters) is the provider's job.
//!
//! ## Providers
//!
//! - [`SerialTransport`] - a real serial port via `tokio-serial` (feature `rtu`)
//! - [`SimulatedSensor`](crate::simulator::SimulatedSensor) - an in-memory sensor
//!
//! The provider is chosen once at startup; nothing below the session layer
//! knows which one is active.

use std::future::Future;
use std::time::Duration;

use crate::error::SensorResult;

/// Duplex byte channel to one RS-485 bus.
///
/// Implementations must be `Send` so a sampler owning the transport can run
/// on a tokio task. Callers hold `&mut self` for a whole transaction, which
/// keeps a single request/response in flight per bus.
pub trait SensorTransport: Send {
    /// Write a complete frame.
    fn write(&mut self, frame: &[u8]) -> impl Future<Output = SensorResult<()>> + Send;

    /// Read up to `max_bytes`, waiting at most `timeout`.
    ///
    /// Returns whatever arrived before the deadline; an empty vector means
    /// nothing was received.
    fn read(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
    ) -> impl Future<Output = SensorResult<Vec<u8>>> + Send;

    /// Discard bytes received but not yet read.
    fn reset_input_buffer(&mut self) -> SensorResult<()>;

    /// Discard bytes written but not yet transmitted.
    fn reset_output_buffer(&mut self) -> SensorResult<()>;

    /// Whether the channel is open.
    fn is_open(&self) -> bool;

    /// Close the channel. Further calls fail with a transport error.
    fn close(&mut self) -> impl Future<Output = SensorResult<()>> + Send;
}

#[cfg(feature = "rtu")]
pub use serial::{list_ports, SerialTransport};

#[cfg(feature = "rtu")]
mod serial {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_serial::{ClearBuffer, SerialPort, SerialStream};
    use tracing::{debug, info};

    use super::SensorTransport;
    use crate::config::SensorConfig;
    use crate::error::{SensorError, SensorResult};

    /// Serial port provider, 8 data bits, no parity, 1 stop bit.
    pub struct SerialTransport {
        /// Serial port connection
        port: Option<SerialStream>,
        /// Port name/path
        port_name: String,
        baud_rate: u32,
    }

    impl SerialTransport {
        /// Open a serial port with the sensor's line settings.
        pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> SensorResult<Self> {
            let builder = tokio_serial::new(port, baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .stop_bits(tokio_serial::StopBits::One)
                .parity(tokio_serial::Parity::None)
                .timeout(timeout);

            let stream = SerialStream::open(&builder).map_err(|e| {
                SensorError::transport(format!("Failed to open serial port {}: {}", port, e))
            })?;

            info!("Opened serial port {} at {} baud (8N1)", port, baud_rate);

            Ok(Self {
                port: Some(stream),
                port_name: port.to_string(),
                baud_rate,
            })
        }

        /// Open the port named in the configuration.
        pub fn from_config(config: &SensorConfig) -> SensorResult<Self> {
            if config.port.is_empty() {
                return Err(SensorError::config("no serial port configured"));
            }
            Self::open(&config.port, config.baud_rate, config.read_timeout())
        }

        pub fn port_name(&self) -> &str {
            &self.port_name
        }

        pub fn baud_rate(&self) -> u32 {
            self.baud_rate
        }

        fn stream(&mut self) -> SensorResult<&mut SerialStream> {
            self.port
                .as_mut()
                .ok_or_else(|| SensorError::transport("Serial port not open"))
        }

        fn clear(&mut self, buffer: ClearBuffer) -> SensorResult<()> {
            self.stream()?
                .clear(buffer)
                .map_err(|e| SensorError::transport(format!("Failed to clear buffer: {}", e)))
        }
    }

    impl SensorTransport for SerialTransport {
        async fn write(&mut self, frame: &[u8]) -> SensorResult<()> {
            let stream = self.stream()?;
            stream
                .write_all(frame)
                .await
                .map_err(|e| SensorError::transport(format!("Serial write error: {}", e)))?;
            stream
                .flush()
                .await
                .map_err(|e| SensorError::transport(format!("Serial flush error: {}", e)))
        }

        async fn read(&mut self, max_bytes: usize, timeout: Duration) -> SensorResult<Vec<u8>> {
            let stream = self.stream()?;
            let deadline = tokio::time::Instant::now() + timeout;
            let mut buffer = vec![0u8; max_bytes];
            let mut filled = 0;

            while filled < max_bytes {
                match tokio::time::timeout_at(deadline, stream.read(&mut buffer[filled..])).await {
                    Ok(Ok(0)) => break,
                    Ok(Ok(n)) => filled += n,
                    Ok(Err(e)) => {
                        return Err(SensorError::transport(format!("Serial read error: {}", e)))
                    }
                    Err(_) => {
                        debug!("Read deadline reached with {}/{} bytes", filled, max_bytes);
                        break;
                    }
                }
            }

            buffer.truncate(filled);
            Ok(buffer)
        }

        fn reset_input_buffer(&mut self) -> SensorResult<()> {
            self.clear(ClearBuffer::Input)
        }

        fn reset_output_buffer(&mut self) -> SensorResult<()> {
            self.clear(ClearBuffer::Output)
        }

        fn is_open(&self) -> bool {
            self.port.is_some()
        }

        async fn close(&mut self) -> SensorResult<()> {
            if let Some(mut stream) = self.port.take() {
                let _ = stream.shutdown().await;
                info!("Closed serial port {}", self.port_name);
            }
            Ok(())
        }
    }

    /// Names of the serial ports present on this machine.
    pub fn list_ports() -> SensorResult<Vec<String>> {
        tokio_serial::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .map_err(|e| SensorError::transport(format!("Failed to enumerate serial ports: {}", e)))
    }
}
