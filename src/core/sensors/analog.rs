//! Analog sensors read through the Linux IIO sysfs interface.
//!
//! ```text
//! /sys/bus/iio/devices/iio:device0/
//!   in_voltage0_raw   <- light
//!   in_voltage1_raw   <- sound
//!   in_voltage2_raw   <- temperature
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::trace;

use super::{
    error::{SensorError, SensorResult},
    grove, Measurement, SensorReader,
};

/// One ADC channel.
#[derive(Debug, Clone)]
pub struct AnalogInput {
    path: PathBuf,
    max: u32,
}

impl AnalogInput {
    /// Channel `channel` of the IIO device at `device`.
    pub fn new(device: &Path, channel: u8, max: u32) -> Self {
        AnalogInput {
            path: device.join(format!("in_voltage{channel}_raw")),
            max,
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Current raw count.
    pub fn read_raw(&self) -> SensorResult<u32> {
        let content = fs::read_to_string(&self.path).map_err(|source| SensorError::Read {
            path: self.path.clone(),
            source,
        })?;
        let value = content.trim();
        let raw = value.parse::<u32>().map_err(|_| SensorError::Parse {
            path: self.path.clone(),
            value: value.to_string(),
        })?;
        if raw > self.max {
            return Err(SensorError::OutOfRange {
                path: self.path.clone(),
                raw,
                max: self.max,
            });
        }
        trace!(path = %self.path.display(), raw, "ADC read");
        Ok(raw)
    }
}

/// Conversion applied to the raw count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    GroveTemperature,
    GroveLight,
    Loudness { reference_voltage: f64 },
}

impl Curve {
    pub fn apply(&self, raw: u32, max: u32) -> f64 {
        match *self {
            Curve::GroveTemperature => grove::temperature_celsius(raw, max),
            Curve::GroveLight => grove::light_lux(raw, max),
            Curve::Loudness { reference_voltage } => {
                grove::loudness_volts(raw, max, reference_voltage)
            }
        }
    }
}

/// A sensor module on an analog input.
#[derive(Debug, Clone)]
pub struct AnalogSensor {
    name: String,
    input: AnalogInput,
    curve: Curve,
}

impl AnalogSensor {
    pub fn new(name: impl Into<String>, input: AnalogInput, curve: Curve) -> Self {
        AnalogSensor {
            name: name.into(),
            input,
            curve,
        }
    }
}

impl SensorReader for AnalogSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> SensorResult<Measurement> {
        let raw = self.input.read_raw()?;
        Ok(Measurement::with_raw(
            self.curve.apply(raw, self.input.max()),
            raw,
        ))
    }
}
