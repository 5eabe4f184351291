//! # Soil Probe - Modbus RTU Acquisition for 7-in-1 Soil Sensors
//!
//! Polls an RS-485 soil sensor (moisture, temperature, pH, electrical
//! conductivity, nitrogen, phosphorus, potassium) over Modbus RTU and turns
//! its registers into timestamped readings persisted as JSON records.
//!
//! ## Features
//!
//! - **Frame Codec**: FC03 request frames and response parsing with CRC-16/Modbus
//! - **Bounded Retry**: per-register retries degrade to an absent value, never a panic
//! - **Nutrient Fallback**: alternate register and scale factor search for N/P/K
//! - **Sampling Modes**: continuous sessions, single shots and N-sample averages
//! - **Pluggable Transport**: serial port (`rtu` feature) or an in-memory simulator
//!
//! ## Layers
//!
//! | Layer | Module |
//! |-------|--------|
//! | Sampling modes, scheduling | [`sampling`], [`worker`] |
//! | Full read cycle | [`session`] |
//! | Nutrient fallback | [`resolver`] |
//! | Single register read | [`reader`] |
//! | Frames and CRC | [`codec`] |
//! | Byte channel | [`transport`] |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use soil_probe::{AcquisitionSession, SensorConfig, SensorResult, SimulatedSensor};
//!
//! #[tokio::main]
//! async fn main() -> SensorResult<()> {
//!     let config = SensorConfig::default();
//!     let mut session = AcquisitionSession::new(SimulatedSensor::demo(1), &config);
//!
//!     let reading = session.acquire_reading().await;
//!     println!("{}", reading);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Protocol
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus RTU constants and sensor defaults
pub mod constants;

/// Request building, response parsing and CRC-16/Modbus
pub mod codec;

/// Byte channel abstraction and serial provider
pub mod transport;

/// In-memory sensor for tests and hardware-free runs
pub mod simulator;

// ============================================================================
// Acquisition
// ============================================================================

/// Parameters, readings and averages
pub mod reading;

/// Parameter to register configuration
pub mod registers;

/// Link, timing, sampling and output configuration
pub mod config;

/// Single register reads with retry
pub mod reader;

/// Alternate register search for nutrients
pub mod resolver;

/// One read cycle across all parameters
pub mod session;

// ============================================================================
// Sampling
// ============================================================================

/// JSON record files
pub mod storage;

/// Continuous, single-shot and averaging modes
pub mod sampling;

/// Scheduled sampler task
pub mod worker;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime ===
pub use tokio;

// === Error handling ===
pub use error::{SensorError, SensorResult};

// === Core types ===
pub use reading::{AverageRecord, Nutrient, Parameter, Reading};
pub use registers::{RegisterMap, RegisterSpec};

// === Configuration ===
pub use config::{OutputConfig, SamplingConfig, SensorConfig, Timing};

// === Acquisition ===
pub use reader::{ReaderStats, RegisterReader};
pub use resolver::{NutrientResolver, Resolution};
pub use session::AcquisitionSession;

// === Sampling ===
pub use sampling::{Mode, SampleOutcome, Sampler};
pub use storage::RecordStore;
pub use worker::{SamplerCommand, SamplerEvent, SamplerHandle};

// === Transport ===
pub use simulator::SimulatedSensor;
pub use transport::SensorTransport;

#[cfg(feature = "rtu")]
pub use transport::{list_ports, SerialTransport};

// === Frame helpers ===
pub use codec::{build_read_request, checksum, crc16, parse_read_response};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Soil Probe v{} - Modbus RTU soil sensor acquisition", VERSION)
}
