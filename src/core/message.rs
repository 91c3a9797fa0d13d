//! The telemetry payload sent once per cycle.
//!
//! ```json
//! {"deviceId":"dev1","messageId":7,"temp":21.5,"light":300.0,"sound":1.2}
//! ```
//!
//! `temp` is always Celsius and unrounded. Non-finite readings serialize as
//! `null`.

use serde::Serialize;

use super::sensors::SensorReading;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "messageId")]
    pub message_id: u64,
    pub temp: f64,
    pub light: f64,
    pub sound: f64,
}

impl TelemetryMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub struct MessageBuilder;

impl MessageBuilder {
    pub fn build(device_id: &str, sequence: u64, reading: &SensorReading) -> TelemetryMessage {
        TelemetryMessage {
            device_id: device_id.to_string(),
            message_id: sequence,
            temp: reading.temperature_celsius,
            light: reading.light_lux,
            sound: reading.sound_volts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature_celsius: f64) -> SensorReading {
        SensorReading {
            temperature_celsius,
            light_lux: 300.0,
            sound_volts: 1.2,
        }
    }

    #[test]
    fn test_build_exact_payload() {
        let message = MessageBuilder::build("dev1", 7, &reading(21.5));
        assert_eq!(
            message.to_json().unwrap(),
            r#"{"deviceId":"dev1","messageId":7,"temp":21.5,"light":300.0,"sound":1.2}"#
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = MessageBuilder::build("dev1", 3, &reading(19.0));
        let b = MessageBuilder::build("dev1", 3, &reading(19.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_temp_stays_celsius() {
        let message = MessageBuilder::build("dev1", 1, &reading(20.0));
        assert_eq!(message.temp, 20.0);
        assert!(message.to_json().unwrap().contains(r#""temp":20.0"#));
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let message = MessageBuilder::build("dev1", 2, &reading(f64::NAN));
        assert!(message.to_json().unwrap().contains(r#""temp":null"#));
    }
}
