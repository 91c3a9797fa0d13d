//! Sensor capability and the three-sensor sample source.
//!
//! A [`SensorReader`] returns an already-converted physical value. Backends
//! are the IIO analog inputs of the Grove modules ([`analog`]) and constant
//! values for bench runs ([`fixed`]).

pub mod analog;
pub mod error;
pub mod fixed;
pub mod grove;
pub mod source;

pub use analog::{AnalogInput, AnalogSensor, Curve};
pub use error::{SensorError, SensorResult};
pub use fixed::FixedReader;
pub use source::{SampleSource, SensorReading};

/// One converted reading, with the raw ADC count when the backend has one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub raw: Option<u32>,
}

impl Measurement {
    pub fn new(value: f64) -> Self {
        Measurement { value, raw: None }
    }

    pub fn with_raw(value: f64, raw: u32) -> Self {
        Measurement {
            value,
            raw: Some(raw),
        }
    }
}

/// A single physical sensor.
///
/// Reads are synchronous and cheap; they run on the session task between
/// suspension points.
pub trait SensorReader: Send {
    /// Human readable name used in log lines.
    fn name(&self) -> &str;

    fn read(&self) -> SensorResult<Measurement>;
}
