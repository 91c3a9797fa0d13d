//! Conversion curves of the Grove analog sensor modules.
//!
//! All functions take a raw ADC count and the ADC maximum count. The curves
//! are not clamped: a zero count reads as absolute zero and a full-scale
//! count makes the light level infinite. Such implausible values are passed
//! through unchanged.

/// Thermistor B constant of the Grove temperature sensor.
pub const THERMISTOR_B: f64 = 3975.0;

/// Thermistor resistance at 25 °C, in ohms.
pub const THERMISTOR_R0: f64 = 10_000.0;

const KELVIN_AT_25C: f64 = 298.15;
const KELVIN_OFFSET: f64 = 273.15;

/// Temperature in °C from a Grove thermistor divider.
pub fn temperature_celsius(raw: u32, max: u32) -> f64 {
    let resistance = (f64::from(max) / f64::from(raw) - 1.0) * THERMISTOR_R0;
    1.0 / ((resistance / THERMISTOR_R0).ln() / THERMISTOR_B + 1.0 / KELVIN_AT_25C) - KELVIN_OFFSET
}

/// Approximate illuminance in lux from the Grove light sensor.
pub fn light_lux(raw: u32, max: u32) -> f64 {
    let raw = f64::from(raw);
    let ratio = (f64::from(max) - raw) * 10.0 / raw;
    10_000.0 / (ratio * 15.0).powf(4.0 / 3.0)
}

/// Loudness in volts from the analog loudness sensor.
pub fn loudness_volts(raw: u32, max: u32, reference_voltage: f64) -> f64 {
    f64::from(raw) / f64::from(max) * reference_voltage
}
