//! `[sensors]` section: where the three analog sensors are read from.
//!
//! ```toml
//! [sensors]
//! backend = "iio"
//! iio_device = "/sys/bus/iio/devices/iio:device0"
//! adc_bits = 10
//! temperature_channel = 2
//! light_channel = 0
//! sound_channel = 1
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    /// Linux IIO sysfs ADC channels.
    #[default]
    Iio,
    /// Constant values from `[sensors.fixed]`.
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SensorsConfig {
    pub backend: SensorBackend,

    /// IIO device directory holding `in_voltage{N}_raw` files.
    pub iio_device: PathBuf,

    /// ADC resolution; the maximum count is `2^adc_bits - 1`.
    #[validate(range(min = 1, max = 16, message = "adc_bits must be between 1 and 16"))]
    pub adc_bits: u8,

    /// ADC reference voltage, used for loudness.
    #[validate(range(exclusive_min = 0.0, message = "reference_voltage must be positive"))]
    pub reference_voltage: f64,

    pub temperature_channel: u8,
    pub light_channel: u8,
    pub sound_channel: u8,

    pub fixed: FixedValues,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        SensorsConfig {
            backend: SensorBackend::default(),
            iio_device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            adc_bits: 10,
            reference_voltage: 5.0,
            temperature_channel: 2,
            light_channel: 0,
            sound_channel: 1,
            fixed: FixedValues::default(),
        }
    }
}

impl SensorsConfig {
    pub fn adc_max(&self) -> u32 {
        (1u32 << self.adc_bits) - 1
    }
}

/// Values reported by the `fixed` backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedValues {
    pub temperature: f64,
    pub light: f64,
    pub sound: f64,
}

impl Default for FixedValues {
    fn default() -> Self {
        FixedValues {
            temperature: 21.5,
            light: 300.0,
            sound: 1.2,
        }
    }
}
