//! Nutrient fallback search.
//!
//! Sensor revisions disagree on where nitrogen, phosphorus and potassium live
//! and on the unit of the raw value. When the primary register yields nothing
//! useful, the resolver walks each nutrient's alternate registers in order and,
//! for every address, tries each candidate scale factor in order. The first
//! present value strictly greater than zero wins: a register that does not
//! exist on this model reads back zero.

use tracing::{debug, info, warn};

use crate::constants::DEFAULT_FALLBACK_SCALES;
use crate::error::{SensorError, SensorResult};
use crate::reader::RegisterReader;
use crate::reading::Nutrient;
use crate::registers::RegisterMap;
use crate::transport::SensorTransport;

/// Where the fallback search found a plausible value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub address: u16,
    pub scale: f64,
    pub value: f64,
}

/// Searches alternate registers for a positive nutrient value.
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientResolver {
    scales: Vec<f64>,
}

impl NutrientResolver {
    /// Create a resolver trying `scales` in order at every address.
    pub fn new(scales: Vec<f64>) -> Self {
        Self { scales }
    }

    /// Run the search and report which address/scale pair produced the value.
    pub async fn try_resolve<T: SensorTransport>(
        &self,
        reader: &mut RegisterReader<T>,
        registers: &RegisterMap,
        nutrient: Nutrient,
    ) -> SensorResult<Resolution> {
        for &address in registers.alternates(nutrient) {
            for &scale in &self.scales {
                let value = reader.read(address, scale).await;
                debug!(
                    "{} fallback 0x{:04X} x{} -> {:?}",
                    nutrient, address, scale, value
                );
                if let Some(value) = value.filter(|v| *v > 0.0) {
                    info!(
                        "{} resolved at register 0x{:04X} with scale {}: {}",
                        nutrient, address, scale, value
                    );
                    return Ok(Resolution {
                        address,
                        scale,
                        value,
                    });
                }
            }
        }

        Err(SensorError::NoPlausibleValue {
            nutrient: nutrient.to_string(),
        })
    }

    /// Run the search; `0.0` means no nutrient was detected.
    pub async fn resolve<T: SensorTransport>(
        &self,
        reader: &mut RegisterReader<T>,
        registers: &RegisterMap,
        nutrient: Nutrient,
    ) -> f64 {
        match self.try_resolve(reader, registers, nutrient).await {
            Ok(resolution) => resolution.value,
            Err(e) => {
                warn!("{}, reporting 0", e);
                0.0
            }
        }
    }
}

impl Default for NutrientResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_SCALES.to_vec())
    }
}
