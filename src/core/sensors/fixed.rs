use super::{error::SensorResult, Measurement, SensorReader};

/// Reports the same value on every read.
#[derive(Debug, Clone)]
pub struct FixedReader {
    name: String,
    value: f64,
}

impl FixedReader {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        FixedReader {
            name: name.into(),
            value,
        }
    }
}

impl SensorReader for FixedReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> SensorResult<Measurement> {
        Ok(Measurement::new(self.value))
    }
}
