//! Bench diagnostic: log sensor readings without connecting anywhere.

use std::{env, time::Duration};

use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use super::sensors::{SampleSource, SensorReading};

pub const READS_ENV: &str = "SENSORBEE_PROBE_READS";
pub const INTERVAL_ENV: &str = "SENSORBEE_PROBE_INTERVAL_MS";

pub const DEFAULT_READS: u32 = 20;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Error, Debug, PartialEq)]
pub enum ProbeError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSettings {
    pub reads: u32,
    pub interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            reads: DEFAULT_READS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ProbeSettings {
    /// Reads [`READS_ENV`] and [`INTERVAL_ENV`], keeping defaults for unset
    /// variables.
    pub fn from_env() -> Result<Self, ProbeError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProbeError> {
        let mut settings = ProbeSettings::default();
        if let Some(value) = lookup(READS_ENV) {
            settings.reads = parse_positive(READS_ENV, &value)? as u32;
        }
        if let Some(value) = lookup(INTERVAL_ENV) {
            settings.interval = Duration::from_millis(parse_positive(INTERVAL_ENV, &value)?);
        }
        Ok(settings)
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ProbeError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(u64::from(n)),
        _ => Err(ProbeError::InvalidSetting {
            name,
            value: value.to_string(),
        }),
    }
}

pub struct Probe {
    source: SampleSource,
    settings: ProbeSettings,
}

impl Probe {
    pub fn new(source: SampleSource, settings: ProbeSettings) -> Self {
        Probe { source, settings }
    }

    /// Samples `reads` times, each after one `interval`.
    pub async fn run(&self) -> Vec<SensorReading> {
        info!(
            "Probing sensors {} times every {:?}",
            self.settings.reads, self.settings.interval
        );
        let mut readings = Vec::with_capacity(self.settings.reads as usize);
        for _ in 0..self.settings.reads {
            sleep(self.settings.interval).await;
            readings.push(self.source.sample());
        }
        info!("Probe finished after {} reads", readings.len());
        readings
    }
}
