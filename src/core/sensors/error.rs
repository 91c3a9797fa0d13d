use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single sensor read.
///
/// Never leaves the sensors module: [`super::SampleSource`] turns it into a
/// `NaN` reading.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ADC count '{value}' from {}", path.display())]
    Parse { path: PathBuf, value: String },

    #[error("ADC count {raw} from {} exceeds maximum {max}", path.display())]
    OutOfRange { path: PathBuf, raw: u32, max: u32 },
}

pub type SensorResult<T> = std::result::Result<T, SensorError>;
