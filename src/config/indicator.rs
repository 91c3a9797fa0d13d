//! `[indicator]` section: the LED pulsed after each successful publish.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorBackend {
    /// Linux sysfs GPIO.
    #[default]
    Gpio,
    /// Log lines only, for hosts without an LED.
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IndicatorConfig {
    pub backend: IndicatorBackend,

    #[validate(range(max = 1023, message = "gpio_pin must not exceed 1023"))]
    pub gpio_pin: u32,

    /// Root of the sysfs GPIO class.
    pub gpio_root: PathBuf,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            backend: IndicatorBackend::default(),
            gpio_pin: 13,
            gpio_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}
