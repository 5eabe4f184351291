//! # Acquisition Session
//!
//! One full read cycle across the seven parameters, in fixed order:
//! moisture, temperature, pH, conductivity, nitrogen, phosphorus, potassium.
//! A pacing delay separates consecutive parameters.
//!
//! Nutrients read their primary register first. An absent or zero result
//! hands the nutrient to the [`NutrientResolver`], whose answer (possibly
//! `0.0`, "no nutrient detected") replaces it.
//!
//! A cycle issues at least seven transactions and, with retries and fallback
//! searches, may run for tens of seconds on a bad line. `&mut self` keeps
//! callers from starting a second cycle while one is outstanding.

use std::time::Duration;

use chrono::Local;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::SensorConfig;
use crate::error::SensorResult;
use crate::reader::RegisterReader;
use crate::reading::{Parameter, Reading};
use crate::registers::RegisterMap;
use crate::resolver::NutrientResolver;
use crate::transport::SensorTransport;

/// Reads complete [`Reading`]s from one sensor.
pub struct AcquisitionSession<T: SensorTransport> {
    reader: RegisterReader<T>,
    registers: RegisterMap,
    resolver: NutrientResolver,
    pacing: Duration,
}

impl<T: SensorTransport> AcquisitionSession<T> {
    /// Create a session over `transport` using the register map, fallback
    /// scales and timing of `config`.
    pub fn new(transport: T, config: &SensorConfig) -> Self {
        Self::from_parts(
            RegisterReader::new(transport, config),
            config.registers.clone(),
            NutrientResolver::new(config.fallback_scales.clone()),
            config.timing.pacing_delay(),
        )
    }

    /// Assemble a session from its collaborators.
    pub fn from_parts(
        reader: RegisterReader<T>,
        registers: RegisterMap,
        resolver: NutrientResolver,
        pacing: Duration,
    ) -> Self {
        Self {
            reader,
            registers,
            resolver,
            pacing,
        }
    }

    pub fn reader(&self) -> &RegisterReader<T> {
        &self.reader
    }

    /// Read all seven parameters and stamp the result with the current time.
    pub async fn acquire_reading(&mut self) -> Reading {
        let mut values = Vec::with_capacity(Parameter::ALL.len());

        for (index, parameter) in Parameter::ALL.into_iter().enumerate() {
            if index > 0 {
                sleep(self.pacing).await;
            }
            let value = self.read_parameter(parameter).await;
            debug!("{} = {:?}", parameter, value);
            values.push((parameter, value));
        }

        let reading = Reading::from_values(values, Local::now());
        info!("Acquired {}", reading);
        reading
    }

    /// Read a single parameter, running the fallback search for nutrients
    /// whose primary register is absent or zero.
    pub async fn read_parameter(&mut self, parameter: Parameter) -> Option<f64> {
        let spec = self.registers.primary(parameter);
        let value = self.reader.read(spec.address, spec.scale).await;

        match parameter.nutrient() {
            Some(nutrient) if value.map_or(true, |v| v == 0.0) => Some(
                self.resolver
                    .resolve(&mut self.reader, &self.registers, nutrient)
                    .await,
            ),
            _ => value,
        }
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> SensorResult<()> {
        self.reader.transport_mut().close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::reading::Nutrient;
    use crate::simulator::SimulatedSensor;

    fn session(sensor: SimulatedSensor) -> AcquisitionSession<SimulatedSensor> {
        let config = SensorConfig::default().with_timing(Timing::immediate());
        AcquisitionSession::new(sensor, &config)
    }

    #[tokio::test]
    async fn test_nitrogen_fallback_end_to_end() {
        // Only 0x0025 read at scale 1.0 yields the raw 42
        let sensor = SimulatedSensor::new(1)
            .with_register(0x0013, 18)
            .with_register(0x0014, 87)
            .with_queued_values(0x0025, vec![0, 42]);
        let mut session = session(sensor);

        let reading = session.acquire_reading().await;

        assert_eq!(reading.get(Parameter::Nitrogen), Some(42.0));
        assert_eq!(reading.get(Parameter::Phosphorus), Some(18.0));
        assert_eq!(reading.get(Parameter::Potassium), Some(87.0));

        let requests = session.reader().transport().requests();
        let nitrogen_search: Vec<u16> = requests
            .iter()
            .copied()
            .skip_while(|a| *a != 0x0004)
            .take_while(|a| *a != 0x0013)
            .collect();
        assert_eq!(
            nitrogen_search,
            vec![0x0004, 0x0004, 0x0004, 0x0012, 0x0012, 0x0012, 0x0025, 0x0025]
        );
    }

    #[tokio::test]
    async fn test_reads_parameters_in_order() {
        let mut session = session(SimulatedSensor::demo(1).with_register(0x0012, 40));

        let reading = session.acquire_reading().await;

        assert_eq!(
            session.reader().transport().requests(),
            &[0x0015, 0x0001, 0x0024, 0x0064, 0x0012, 0x0013, 0x0014]
        );
        assert!((reading.get(Parameter::Moisture).unwrap() - 31.2).abs() < 1e-9);
        assert!((reading.get(Parameter::Temperature).unwrap() - 22.5).abs() < 1e-9);
        assert!((reading.get(Parameter::Ph).unwrap() - 6.8).abs() < 1e-9);
        assert_eq!(reading.get(Parameter::Conductivity), Some(412.0));
        assert_eq!(reading.get(Parameter::Nitrogen), Some(40.0));
    }

    #[tokio::test]
    async fn test_failed_parameter_is_absent() {
        // Moisture gets no answer for all three attempts
        let mut session = session(SimulatedSensor::demo(1).with_silent_requests(3));

        let reading = session.acquire_reading().await;

        assert_eq!(reading.get(Parameter::Moisture), None);
        assert!(reading.get(Parameter::Temperature).is_some());
        assert_eq!(reading.missing_count(), 1);
    }

    #[tokio::test]
    async fn test_undetected_nutrient_reports_zero() {
        let registers = RegisterMap::default().with_alternates(Nutrient::Potassium, vec![0x0200]);
        let config = SensorConfig::default()
            .with_timing(Timing::immediate())
            .with_registers(registers);
        let mut session = AcquisitionSession::new(SimulatedSensor::new(1), &config);

        assert_eq!(session.read_parameter(Parameter::Potassium).await, Some(0.0));
        assert_eq!(
            session.reader().transport().requests(),
            &[0x0014, 0x0200, 0x0200, 0x0200]
        );
    }

    #[tokio::test]
    async fn test_non_nutrient_zero_is_kept() {
        let mut session = session(SimulatedSensor::new(1));
        assert_eq!(session.read_parameter(Parameter::Temperature).await, Some(0.0));
        assert_eq!(session.reader().transport().requests(), &[0x0001]);
    }

    #[tokio::test]
    async fn test_close_closes_transport() {
        let mut session = session(SimulatedSensor::demo(1));
        session.close().await.unwrap();
        assert!(!session.reader().transport().is_open());
    }
}
