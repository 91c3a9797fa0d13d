//! The remote collector as seen by the publish session.
//!
//! A [`Collector`] is connected exactly once and then receives one
//! [`TelemetryMessage`] per cycle. Each call resolves exactly once.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::message::TelemetryMessage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    #[error("connection refused: {0}")]
    Rejected(String),

    #[error("no connection outcome within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not connected: {0}")]
    NotConnected(String),
}

#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    /// Establishes the connection. Called once, before any publish.
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Sends one message and resolves with its outcome.
    async fn publish(&self, message: &TelemetryMessage) -> Result<(), PublishError>;

    /// Releases the connection at the end of the session.
    async fn close(&self) {}
}

/// Collector used when no transport is compiled in. Every publish succeeds.
#[derive(Debug, Default)]
pub struct LogCollector;

#[async_trait::async_trait]
impl Collector for LogCollector {
    async fn connect(&self) -> Result<(), ConnectError> {
        info!("No transport configured, messages are logged only");
        Ok(())
    }

    async fn publish(&self, message: &TelemetryMessage) -> Result<(), PublishError> {
        debug!("Dropping message #{}", message.message_id);
        Ok(())
    }
}

#[cfg(feature = "sensorbee-mqtt")]
pub use mqtt::MqttCollector;

#[cfg(feature = "sensorbee-mqtt")]
mod mqtt {
    use std::sync::Arc;

    use sensorbee_mqtt::{MqttInstance, Publisher, TransferError};
    use tracing::{debug, warn};

    use super::{Collector, ConnectError, PublishError};
    use crate::core::message::TelemetryMessage;

    /// Publishes telemetry to an MQTT broker.
    pub struct MqttCollector {
        instance: Arc<MqttInstance>,
        publisher: Publisher,
        topic: String,
        qos: u8,
    }

    impl MqttCollector {
        pub fn new(instance: Arc<MqttInstance>, topic: impl Into<String>, qos: u8) -> Self {
            MqttCollector {
                publisher: Publisher::new(instance.clone()),
                instance,
                topic: topic.into(),
                qos,
            }
        }
    }

    #[async_trait::async_trait]
    impl Collector for MqttCollector {
        async fn connect(&self) -> Result<(), ConnectError> {
            self.instance.wait_connected().await.map_err(connect_error)
        }

        async fn publish(&self, message: &TelemetryMessage) -> Result<(), PublishError> {
            self.publisher
                .publish(message, &self.topic, self.qos)
                .await
                .map_err(publish_error)
        }

        async fn close(&self) {
            debug!("Closing MQTT connection");
            if let Err(e) = self.instance.shutdown().await {
                warn!("MQTT shutdown incomplete: {}", e);
            }
        }
    }

    pub(super) fn connect_error(err: TransferError) -> ConnectError {
        match err {
            TransferError::ConnectTimeout(after) => ConnectError::Timeout(after),
            TransferError::Connect(reason) => ConnectError::Rejected(reason),
            other => ConnectError::Transport(other.to_string()),
        }
    }

    pub(super) fn publish_error(err: TransferError) -> PublishError {
        match err {
            TransferError::Serialization(reason) => PublishError::Serialization(reason),
            TransferError::NotConnected(reason) => PublishError::NotConnected(reason),
            other => PublishError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{message::MessageBuilder, sensors::SensorReading};

    #[tokio::test]
    async fn test_log_collector_always_succeeds() {
        let collector = LogCollector;
        let reading = SensorReading {
            temperature_celsius: 21.5,
            light_lux: 300.0,
            sound_volts: 1.2,
        };

        assert!(collector.connect().await.is_ok());
        let message = MessageBuilder::build("dev1", 1, &reading);
        assert!(collector.publish(&message).await.is_ok());
        collector.close().await;
    }

    #[cfg(feature = "sensorbee-mqtt")]
    #[test]
    fn test_transfer_error_mapping() {
        use sensorbee_mqtt::TransferError;

        assert_eq!(
            mqtt::connect_error(TransferError::ConnectTimeout(Duration::from_secs(30))),
            ConnectError::Timeout(Duration::from_secs(30))
        );
        assert_eq!(
            mqtt::connect_error(TransferError::Connect("NotAuthorized".into())),
            ConnectError::Rejected("NotAuthorized".into())
        );
        assert!(matches!(
            mqtt::connect_error(TransferError::ClientSetup("no CA".into())),
            ConnectError::Transport(_)
        ));

        assert_eq!(
            mqtt::publish_error(TransferError::NotConnected("Closed".into())),
            PublishError::NotConnected("Closed".into())
        );
        assert!(matches!(
            mqtt::publish_error(TransferError::InvalidMetadata("empty topic".into())),
            PublishError::Transport(_)
        ));
    }
}
