//! In-memory simulated soil sensor
//!
//! Answers well-formed FC03 request frames from a register bank the way the
//! real device does: unmapped registers read back zero, frames addressed to
//! another slave get no answer. Used by the CLI's `--simulate` mode and by
//! tests that need a full request/response cycle without hardware.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::debug;

use crate::codec::{crc16, format_hex};
use crate::constants::{CRC_LEN, FC_READ_HOLDING_REGISTERS, READ_REQUEST_LEN};
use crate::error::{SensorError, SensorResult};
use crate::transport::SensorTransport;

/// Simulated sensor on an in-memory bus.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    slave_address: u8,
    registers: HashMap<u16, u16>,
    /// One-shot values served before the register bank value
    queued: HashMap<u16, VecDeque<u16>>,
    /// Response bytes waiting to be read
    pending: VecDeque<u8>,
    /// Number of upcoming requests that get no answer
    silent_requests: usize,
    /// Register addresses requested, in order
    requests: Vec<u16>,
    open: bool,
}

impl SimulatedSensor {
    /// Empty sensor: every register reads zero.
    pub fn new(slave_address: u8) -> Self {
        Self {
            slave_address,
            registers: HashMap::new(),
            queued: HashMap::new(),
            pending: VecDeque::new(),
            silent_requests: 0,
            requests: Vec::new(),
            open: true,
        }
    }

    /// Sensor preloaded with plausible soil values on the default register map.
    ///
    /// The nitrogen primary register reads zero and the value lives at one of
    /// its alternates, so the fallback search is exercised.
    pub fn demo(slave_address: u8) -> Self {
        Self::new(slave_address)
            .with_register(0x0015, 312) // moisture 31.2 %
            .with_register(0x0001, 225) // temperature 22.5 °C
            .with_register(0x0024, 68) // pH 6.8
            .with_register(0x0064, 412) // EC 412 µS/cm
            .with_register(0x0025, 42) // nitrogen (alternate)
            .with_register(0x0013, 18) // phosphorus
            .with_register(0x0014, 87) // potassium
    }

    /// Set a register value.
    pub fn with_register(mut self, address: u16, value: u16) -> Self {
        self.registers.insert(address, value);
        self
    }

    /// Serve `values` to the next reads of `address`, one per request, before
    /// falling back to the register bank.
    pub fn with_queued_values(mut self, address: u16, values: Vec<u16>) -> Self {
        self.queued.entry(address).or_default().extend(values);
        self
    }

    /// Leave the next `count` requests unanswered.
    pub fn with_silent_requests(mut self, count: usize) -> Self {
        self.silent_requests = count;
        self
    }

    /// Register addresses requested so far, in order
    pub fn requests(&self) -> &[u16] {
        &self.requests
    }

    fn handle_request(&mut self, frame: &[u8]) {
        if frame.len() != READ_REQUEST_LEN {
            debug!("Simulator ignoring frame of {} bytes", frame.len());
            return;
        }

        let body = &frame[..READ_REQUEST_LEN - CRC_LEN];
        let received = u16::from_le_bytes([frame[6], frame[7]]);
        if crc16(body) != received {
            debug!("Simulator ignoring frame with bad CRC: {}", format_hex(frame));
            return;
        }
        if body[0] != self.slave_address || body[1] != FC_READ_HOLDING_REGISTERS {
            return;
        }

        let address = u16::from_be_bytes([body[2], body[3]]);
        let count = u16::from_be_bytes([body[4], body[5]]);
        self.requests.push(address);

        if self.silent_requests > 0 {
            self.silent_requests -= 1;
            return;
        }

        let mut response = vec![
            self.slave_address,
            FC_READ_HOLDING_REGISTERS,
            count.saturating_mul(2).min(u16::from(u8::MAX)) as u8,
        ];
        for offset in 0..count {
            let register = address.wrapping_add(offset);
            let queued = self.queued.get_mut(&register).and_then(VecDeque::pop_front);
            let value = queued
                .or_else(|| self.registers.get(&register).copied())
                .unwrap_or(0);
            response.extend_from_slice(&value.to_be_bytes());
        }
        let crc = crc16(&response);
        response.extend_from_slice(&crc.to_le_bytes());
        self.pending.extend(response);
    }

    fn ensure_open(&self) -> SensorResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(SensorError::transport("Simulated bus closed"))
        }
    }
}

impl SensorTransport for SimulatedSensor {
    async fn write(&mut self, frame: &[u8]) -> SensorResult<()> {
        self.ensure_open()?;
        self.handle_request(frame);
        Ok(())
    }

    async fn read(&mut self, max_bytes: usize, _timeout: Duration) -> SensorResult<Vec<u8>> {
        self.ensure_open()?;
        let take = max_bytes.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }

    fn reset_input_buffer(&mut self) -> SensorResult<()> {
        self.ensure_open()?;
        self.pending.clear();
        Ok(())
    }

    fn reset_output_buffer(&mut self) -> SensorResult<()> {
        self.ensure_open()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> SensorResult<()> {
        self.open = false;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{build_read_request, parse_read_response, verify_response_crc};

    #[tokio::test]
    async fn test_answers_read_request() {
        let mut sensor = SimulatedSensor::new(1).with_register(0x0015, 312);
        sensor.write(&build_read_request(1, 0x0015, 1)).await.unwrap();

        let response = sensor.read(7, Duration::from_secs(2)).await.unwrap();
        assert!(verify_response_crc(&response).is_ok());
        assert_eq!(parse_read_response(&response, 1).unwrap(), 312);
        assert_eq!(sensor.requests(), &[0x0015]);
    }

    #[tokio::test]
    async fn test_unmapped_register_reads_zero() {
        let mut sensor = SimulatedSensor::new(1);
        sensor.write(&build_read_request(1, 0x0030, 1)).await.unwrap();
        let response = sensor.read(7, Duration::ZERO).await.unwrap();
        assert_eq!(parse_read_response(&response, 1).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queued_values_come_first() {
        let mut sensor = SimulatedSensor::new(1)
            .with_register(0x0025, 7)
            .with_queued_values(0x0025, vec![0, 42]);

        let mut values = Vec::new();
        for _ in 0..3 {
            sensor.write(&build_read_request(1, 0x0025, 1)).await.unwrap();
            let response = sensor.read(7, Duration::ZERO).await.unwrap();
            values.push(parse_read_response(&response, 1).unwrap());
        }
        assert_eq!(values, vec![0, 42, 7]);
    }

    #[tokio::test]
    async fn test_other_slave_gets_no_answer() {
        let mut sensor = SimulatedSensor::new(1);
        sensor.write(&build_read_request(2, 0x0015, 1)).await.unwrap();
        assert!(sensor.read(7, Duration::ZERO).await.unwrap().is_empty());
        assert!(sensor.requests().is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_request_is_ignored() {
        let mut sensor = SimulatedSensor::new(1);
        let mut frame = build_read_request(1, 0x0015, 1);
        frame[7] ^= 0x01;
        sensor.write(&frame).await.unwrap();
        assert!(sensor.read(7, Duration::ZERO).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_silent_requests_and_close() {
        let mut sensor = SimulatedSensor::new(1).with_silent_requests(1);
        sensor.write(&build_read_request(1, 0x0001, 1)).await.unwrap();
        assert!(sensor.read(7, Duration::ZERO).await.unwrap().is_empty());

        sensor.write(&build_read_request(1, 0x0001, 1)).await.unwrap();
        assert_eq!(sensor.read(7, Duration::ZERO).await.unwrap().len(), 7);

        sensor.close().await.unwrap();
        assert!(!sensor.is_open());
        assert!(matches!(
            sensor.write(&build_read_request(1, 0x0001, 1)).await,
            Err(SensorError::Transport { .. })
        ));
    }
}
