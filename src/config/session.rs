//! `[session]` section: bounds and timings of a publish session.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Placeholder replaced by the device id in [`SessionConfig::topic`].
pub const DEVICE_ID_PLACEHOLDER: &str = "{device_id}";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionConfig {
    /// Publish attempts before the session drains. Failed attempts count.
    #[validate(range(min = 1, message = "message_limit must be at least 1"))]
    pub message_limit: u64,

    /// Delay between the outcome of one cycle and the start of the next.
    #[validate(range(min = 1, message = "pacing_interval_ms must be at least 1"))]
    pub pacing_interval_ms: u64,

    /// Delay between a successful connect and the first cycle.
    pub settling_delay_ms: u64,

    /// Delay between the last outcome and termination.
    pub grace_period_ms: u64,

    /// How long the indicator stays on after a successful publish.
    #[validate(range(min = 1, message = "pulse_duration_ms must be at least 1"))]
    pub pulse_duration_ms: u64,

    /// Publish topic; `{device_id}` is substituted at startup.
    pub topic: String,

    #[validate(range(max = 2, message = "qos must be 0, 1 or 2"))]
    pub qos: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            message_limit: 2000,
            pacing_interval_ms: 5000,
            settling_delay_ms: 5000,
            grace_period_ms: 10_000,
            pulse_duration_ms: 100,
            topic: format!("devices/{DEVICE_ID_PLACEHOLDER}/messages/events/"),
            qos: 1,
        }
    }
}

impl SessionConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_duration_ms)
    }

    /// The publish topic for `device_id`.
    pub fn topic_for(&self, device_id: &str) -> String {
        self.topic.replace(DEVICE_ID_PLACEHOLDER, device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pacing_interval(), Duration::from_secs(5));
        assert_eq!(config.settling_delay(), Duration::from_secs(5));
        assert_eq!(config.grace_period(), Duration::from_secs(10));
        assert_eq!(config.pulse_duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_topic_substitution() {
        let config = SessionConfig::default();
        assert_eq!(config.topic_for("dev1"), "devices/dev1/messages/events/");

        let fixed = SessionConfig {
            topic: "telemetry".into(),
            ..Default::default()
        };
        assert_eq!(fixed.topic_for("dev1"), "telemetry");
    }

    #[test]
    fn test_qos_out_of_range() {
        let config = SessionConfig {
            qos: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
