//! # Register Map
//!
//! Static parameter→register configuration for the soil sensor.
//!
//! Each parameter has a primary holding register and a scale factor applied
//! to the raw 16-bit value. Nutrients also have an ordered list of alternate
//! registers searched when the primary register reads zero or fails.
//!
//! ## Default Map (7-in-1 sensor)
//!
//! | Parameter | Register | Scale |
//! |-----------|----------|-------|
//! | moisture | 0x0015 | 0.1 |
//! | temperature | 0x0001 | 0.1 |
//! | pH | 0x0024 | 0.1 |
//! | conductivity | 0x0064 | 1.0 |
//! | nitrogen | 0x0012 | 1.0 |
//! | phosphorus | 0x0013 | 1.0 |
//! | potassium | 0x0014 | 1.0 |
//!
//! Different sensor revisions move registers around; substitute a map
//! instead of patching globals.

use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};
use crate::reading::{Nutrient, Parameter};

/// Primary register and scale factor for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// Holding register address
    pub address: u16,
    /// Multiplier applied to the raw register value
    pub scale: f64,
}

impl RegisterSpec {
    /// Create a register spec
    pub const fn new(address: u16, scale: f64) -> Self {
        Self { address, scale }
    }
}

/// Alternate register lists for the three nutrients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutrientAlternates {
    pub nitrogen: Vec<u16>,
    pub phosphorus: Vec<u16>,
    pub potassium: Vec<u16>,
}

impl Default for NutrientAlternates {
    fn default() -> Self {
        Self {
            nitrogen: vec![0x0004, 0x0012, 0x0025, 0x0030],
            phosphorus: vec![0x0005, 0x0013, 0x0026, 0x0031],
            potassium: vec![0x0006, 0x0014, 0x0027, 0x0032],
        }
    }
}

/// Register configuration for every sensor parameter.
///
/// # Example
///
/// ```rust
/// use soil_probe::registers::{RegisterMap, RegisterSpec};
/// use soil_probe::reading::{Nutrient, Parameter};
///
/// let map = RegisterMap::default()
///     .with_primary(Parameter::Ph, RegisterSpec::new(0x0006, 0.01))
///     .with_alternates(Nutrient::Nitrogen, vec![0x001E]);
///
/// assert_eq!(map.primary(Parameter::Ph).address, 0x0006);
/// assert_eq!(map.alternates(Nutrient::Nitrogen), &[0x001E]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMap {
    pub moisture: RegisterSpec,
    pub temperature: RegisterSpec,
    pub ph: RegisterSpec,
    pub conductivity: RegisterSpec,
    pub nitrogen: RegisterSpec,
    pub phosphorus: RegisterSpec,
    pub potassium: RegisterSpec,
    /// Fallback registers searched for nutrients
    pub alternates: NutrientAlternates,
}

impl RegisterMap {
    /// Create the default 7-in-1 sensor map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary register of a parameter
    pub fn primary(&self, parameter: Parameter) -> RegisterSpec {
        match parameter {
            Parameter::Moisture => self.moisture,
            Parameter::Temperature => self.temperature,
            Parameter::Ph => self.ph,
            Parameter::Conductivity => self.conductivity,
            Parameter::Nitrogen => self.nitrogen,
            Parameter::Phosphorus => self.phosphorus,
            Parameter::Potassium => self.potassium,
        }
    }

    /// Alternate registers of a nutrient, in search order
    pub fn alternates(&self, nutrient: Nutrient) -> &[u16] {
        match nutrient {
            Nutrient::Nitrogen => &self.alternates.nitrogen,
            Nutrient::Phosphorus => &self.alternates.phosphorus,
            Nutrient::Potassium => &self.alternates.potassium,
        }
    }

    /// Replace the primary register of a parameter.
    pub fn with_primary(mut self, parameter: Parameter, spec: RegisterSpec) -> Self {
        let slot = match parameter {
            Parameter::Moisture => &mut self.moisture,
            Parameter::Temperature => &mut self.temperature,
            Parameter::Ph => &mut self.ph,
            Parameter::Conductivity => &mut self.conductivity,
            Parameter::Nitrogen => &mut self.nitrogen,
            Parameter::Phosphorus => &mut self.phosphorus,
            Parameter::Potassium => &mut self.potassium,
        };
        *slot = spec;
        self
    }

    /// Replace the alternate register list of a nutrient.
    pub fn with_alternates(mut self, nutrient: Nutrient, addresses: Vec<u16>) -> Self {
        match nutrient {
            Nutrient::Nitrogen => self.alternates.nitrogen = addresses,
            Nutrient::Phosphorus => self.alternates.phosphorus = addresses,
            Nutrient::Potassium => self.alternates.potassium = addresses,
        }
        self
    }

    /// Check that every scale factor is a positive finite number.
    pub fn validate(&self) -> SensorResult<()> {
        for parameter in Parameter::ALL {
            let spec = self.primary(parameter);
            if !(spec.scale.is_finite() && spec.scale > 0.0) {
                return Err(SensorError::config(format!(
                    "scale factor for {} must be positive, got {}",
                    parameter, spec.scale
                )));
            }
        }
        Ok(())
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            moisture: RegisterSpec::new(0x0015, 0.1),
            temperature: RegisterSpec::new(0x0001, 0.1),
            ph: RegisterSpec::new(0x0024, 0.1),
            conductivity: RegisterSpec::new(0x0064, 1.0),
            nitrogen: RegisterSpec::new(0x0012, 1.0),
            phosphorus: RegisterSpec::new(0x0013, 1.0),
            potassium: RegisterSpec::new(0x0014, 1.0),
            alternates: NutrientAlternates::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map() {
        let map = RegisterMap::default();
        assert_eq!(map.primary(Parameter::Moisture), RegisterSpec::new(0x0015, 0.1));
        assert_eq!(map.primary(Parameter::Conductivity), RegisterSpec::new(0x0064, 1.0));
        assert_eq!(
            map.alternates(Nutrient::Nitrogen),
            &[0x0004, 0x0012, 0x0025, 0x0030]
        );
        assert_eq!(
            map.alternates(Nutrient::Potassium),
            &[0x0006, 0x0014, 0x0027, 0x0032]
        );
        assert!(map.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let map = RegisterMap::default().with_primary(Parameter::Ph, RegisterSpec::new(0x0024, 0.0));
        assert!(matches!(map.validate(), Err(SensorError::Config { .. })));

        let map = RegisterMap::default()
            .with_primary(Parameter::Ph, RegisterSpec::new(0x0024, f64::NAN));
        assert!(map.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let map: RegisterMap =
            serde_json::from_str(r#"{"ph": {"address": 6, "scale": 0.01}}"#).unwrap();
        assert_eq!(map.primary(Parameter::Ph), RegisterSpec::new(6, 0.01));
        assert_eq!(map.primary(Parameter::Moisture), RegisterSpec::new(0x0015, 0.1));
        assert_eq!(map.alternates(Nutrient::Phosphorus).len(), 4);

        let map: RegisterMap =
            serde_json::from_str(r#"{"alternates": {"nitrogen": [30]}}"#).unwrap();
        assert_eq!(map.alternates(Nutrient::Nitrogen), &[30]);
        assert_eq!(map.alternates(Nutrient::Potassium)[0], 0x0006);
    }
}
