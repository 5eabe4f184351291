//! Sensor readings and derived averages
//!
//! A [`Reading`] always carries the seven fixed parameters plus one session
//! timestamp. Present values are finite and non-negative; anything else is
//! stored as absent.
//!
//! The serialized form uses the field names of the persisted record format:
//!
//! ```json
//! {
//!   "umidade": 31.2,
//!   "temperatura": 22.5,
//!   "ph": 6.8,
//!   "condutividade": 412.0,
//!   "nitrogenio": 42.0,
//!   "fosforo": null,
//!   "potassio": 87.0,
//!   "timestamp": "2026-10-17T09:30:00.123+02:00"
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One of the seven quantities measured by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Moisture,
    Temperature,
    Ph,
    Conductivity,
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Parameter {
    /// All parameters in acquisition order
    pub const ALL: [Parameter; 7] = [
        Parameter::Moisture,
        Parameter::Temperature,
        Parameter::Ph,
        Parameter::Conductivity,
        Parameter::Nitrogen,
        Parameter::Phosphorus,
        Parameter::Potassium,
    ];

    /// Key used in persisted JSON records
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Moisture => "umidade",
            Parameter::Temperature => "temperatura",
            Parameter::Ph => "ph",
            Parameter::Conductivity => "condutividade",
            Parameter::Nitrogen => "nitrogenio",
            Parameter::Phosphorus => "fosforo",
            Parameter::Potassium => "potassio",
        }
    }

    /// Physical unit of the scaled value
    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Moisture => "%",
            Parameter::Temperature => "°C",
            Parameter::Ph => "pH",
            Parameter::Conductivity => "µS/cm",
            Parameter::Nitrogen | Parameter::Phosphorus | Parameter::Potassium => "mg/kg",
        }
    }

    /// The nutrient this parameter represents, if any
    pub fn nutrient(self) -> Option<Nutrient> {
        match self {
            Parameter::Nitrogen => Some(Nutrient::Nitrogen),
            Parameter::Phosphorus => Some(Nutrient::Phosphorus),
            Parameter::Potassium => Some(Nutrient::Potassium),
            _ => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Nutrient parameters, the only ones with a fallback register search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Nutrient {
    /// All nutrients in acquisition order
    pub const ALL: [Nutrient; 3] = [Nutrient::Nitrogen, Nutrient::Phosphorus, Nutrient::Potassium];

    /// The corresponding reading parameter
    pub fn parameter(self) -> Parameter {
        match self {
            Nutrient::Nitrogen => Parameter::Nitrogen,
            Nutrient::Phosphorus => Parameter::Phosphorus,
            Nutrient::Potassium => Parameter::Potassium,
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.parameter().key())
    }
}

/// Keep a value only if it is a plausible physical quantity.
#[inline]
pub fn sanitize(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Round to two decimal places
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One acquisition cycle across all seven parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "umidade")]
    moisture: Option<f64>,
    #[serde(rename = "temperatura")]
    temperature: Option<f64>,
    #[serde(rename = "ph")]
    ph: Option<f64>,
    #[serde(rename = "condutividade")]
    conductivity: Option<f64>,
    #[serde(rename = "nitrogenio")]
    nitrogen: Option<f64>,
    #[serde(rename = "fosforo")]
    phosphorus: Option<f64>,
    #[serde(rename = "potassio")]
    potassium: Option<f64>,
    timestamp: DateTime<Local>,
}

impl Reading {
    /// Create a reading with every parameter absent
    pub fn empty(timestamp: DateTime<Local>) -> Self {
        Self {
            moisture: None,
            temperature: None,
            ph: None,
            conductivity: None,
            nitrogen: None,
            phosphorus: None,
            potassium: None,
            timestamp,
        }
    }

    /// Build a reading from `(parameter, value)` pairs; unlisted parameters are absent.
    pub fn from_values<I>(values: I, timestamp: DateTime<Local>) -> Self
    where
        I: IntoIterator<Item = (Parameter, Option<f64>)>,
    {
        let mut reading = Self::empty(timestamp);
        for (parameter, value) in values {
            reading.set(parameter, value);
        }
        reading
    }

    /// Value of one parameter
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
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

    fn set(&mut self, parameter: Parameter, value: Option<f64>) {
        let value = sanitize(value);
        match parameter {
            Parameter::Moisture => self.moisture = value,
            Parameter::Temperature => self.temperature = value,
            Parameter::Ph => self.ph = value,
            Parameter::Conductivity => self.conductivity = value,
            Parameter::Nitrogen => self.nitrogen = value,
            Parameter::Phosphorus => self.phosphorus = value,
            Parameter::Potassium => self.potassium = value,
        }
    }

    /// Session timestamp shared by all parameters
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Iterate over `(parameter, value)` in acquisition order
    pub fn iter(&self) -> impl Iterator<Item = (Parameter, Option<f64>)> + '_ {
        Parameter::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    /// Number of parameters that failed to read
    pub fn missing_count(&self) -> usize {
        self.iter().filter(|(_, v)| v.is_none()).count()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.timestamp.format("%H:%M:%S"))?;
        for (parameter, value) in self.iter() {
            match value {
                Some(v) => write!(f, " {}={:.1}{}", parameter, v, parameter.unit())?,
                None => write!(f, " {}=ERR", parameter)?,
            }
        }
        Ok(())
    }
}

/// Mean of a sample buffer, persisted together with its samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageRecord {
    /// Per-parameter means, stamped with the computation time
    #[serde(rename = "media")]
    pub mean: Reading,
    /// Source samples
    #[serde(rename = "leituras")]
    pub samples: Vec<Reading>,
    /// Same instant as `mean.timestamp`
    pub timestamp: DateTime<Local>,
}

impl AverageRecord {
    /// Average the present values of each parameter, rounded to 2 decimals.
    ///
    /// A parameter with no present value in any sample stays absent.
    pub fn compute(samples: Vec<Reading>, timestamp: DateTime<Local>) -> Self {
        let mean = Reading::from_values(
            Parameter::ALL.into_iter().map(|parameter| {
                let present: Vec<f64> = samples.iter().filter_map(|r| r.get(parameter)).collect();
                let value = if present.is_empty() {
                    None
                } else {
                    Some(round2(present.iter().sum::<f64>() / present.len() as f64))
                };
                (parameter, value)
            }),
            timestamp,
        );

        Self {
            mean,
            samples,
            timestamp,
        }
    }
}
