use std::path::Path;

use tracing::{info, warn};

use super::{
    analog::{AnalogInput, AnalogSensor, Curve},
    fixed::FixedReader,
    Measurement, SensorReader,
};
use crate::config::sensors::{SensorBackend, SensorsConfig};

pub const TEMPERATURE_SENSOR: &str = "Temperature Sensor";
pub const LIGHT_SENSOR: &str = "Light Sensor";
pub const SOUND_SENSOR: &str = "Loudness Sensor";

/// Snapshot of the three sensors taken in one [`SampleSource::sample`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_celsius: f64,
    pub light_lux: f64,
    pub sound_volts: f64,
}

impl SensorReading {
    pub fn fahrenheit(&self) -> f64 {
        self.temperature_celsius * 9.0 / 5.0 + 32.0
    }

    /// Fahrenheit rounded to the nearest degree, for display only.
    ///
    /// Halves round up, so -8.5 displays as -8. Never yields -0.
    pub fn fahrenheit_rounded(&self) -> f64 {
        (self.fahrenheit() + 0.5).floor() + 0.0
    }
}

/// Temperature, light and sound sensors sampled together.
pub struct SampleSource {
    temperature: Box<dyn SensorReader>,
    light: Box<dyn SensorReader>,
    sound: Box<dyn SensorReader>,
}

impl SampleSource {
    pub fn new(
        temperature: Box<dyn SensorReader>,
        light: Box<dyn SensorReader>,
        sound: Box<dyn SensorReader>,
    ) -> Self {
        SampleSource {
            temperature,
            light,
            sound,
        }
    }

    pub fn from_config(config: &SensorsConfig) -> Self {
        match config.backend {
            SensorBackend::Iio => {
                let device: &Path = &config.iio_device;
                let max = config.adc_max();
                info!(
                    "Reading sensors from {} ({}-bit ADC)",
                    device.display(),
                    config.adc_bits
                );
                SampleSource::new(
                    Box::new(AnalogSensor::new(
                        TEMPERATURE_SENSOR,
                        AnalogInput::new(device, config.temperature_channel, max),
                        Curve::GroveTemperature,
                    )),
                    Box::new(AnalogSensor::new(
                        LIGHT_SENSOR,
                        AnalogInput::new(device, config.light_channel, max),
                        Curve::GroveLight,
                    )),
                    Box::new(AnalogSensor::new(
                        SOUND_SENSOR,
                        AnalogInput::new(device, config.sound_channel, max),
                        Curve::Loudness {
                            reference_voltage: config.reference_voltage,
                        },
                    )),
                )
            }
            SensorBackend::Fixed => {
                info!("Using fixed sensor values");
                let fixed = &config.fixed;
                SampleSource::new(
                    Box::new(FixedReader::new(TEMPERATURE_SENSOR, fixed.temperature)),
                    Box::new(FixedReader::new(LIGHT_SENSOR, fixed.light)),
                    Box::new(FixedReader::new(SOUND_SENSOR, fixed.sound)),
                )
            }
        }
    }

    /// Reads all three sensors back to back.
    ///
    /// Never fails: a sensor that cannot be read contributes `NaN`.
    pub fn sample(&self) -> SensorReading {
        let temperature = read_or_nan(self.temperature.as_ref());
        let light = read_or_nan(self.light.as_ref());
        let sound = read_or_nan(self.sound.as_ref());

        let reading = SensorReading {
            temperature_celsius: temperature.value,
            light_lux: light.value,
            sound_volts: sound.value,
        };

        info!(
            "{} {} degrees Celsius, or {} degrees Fahrenheit",
            self.temperature.name(),
            reading.temperature_celsius,
            reading.fahrenheit_rounded()
        );
        match light.raw {
            Some(raw) => info!(
                "{} raw value is {}, which is roughly {} lux",
                self.light.name(),
                raw,
                reading.light_lux
            ),
            None => info!("{} is roughly {} lux", self.light.name(), reading.light_lux),
        }
        info!("Detected loudness (volts): {}", reading.sound_volts);

        reading
    }
}

fn read_or_nan(sensor: &dyn SensorReader) -> Measurement {
    sensor.read().unwrap_or_else(|e| {
        warn!("{} read failed: {}", sensor.name(), e);
        Measurement::new(f64::NAN)
    })
}
