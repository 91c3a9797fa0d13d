//! JSON publishing over a running [`MqttInstance`].
//!
//! A publish resolves when the broker has taken responsibility for the
//! message: immediately after hand-off for QoS 0, on PUBACK/PUBCOMP for
//! QoS 1/2. Publishes are expected to be issued one at a time; the
//! acknowledgement that follows a publish is attributed to it.

use std::sync::Arc;

use rumqttc::QoS;
use serde::Serialize;
use tracing::debug;

use super::{
    manager::{MqttInstance, PublishDrain},
    state::ConnectionState,
    TransferError,
};

/// Converts a numeric QoS level.
///
/// # Errors
///
/// `InvalidMetadata` for values above 2.
pub fn qos_from_u8(qos: u8) -> Result<QoS, TransferError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(TransferError::InvalidMetadata(format!(
            "Invalid QoS value: {other}"
        ))),
    }
}

/// Serializes values as JSON and publishes them.
#[derive(Clone)]
pub struct Publisher {
    instance: Arc<MqttInstance>,
    publish_drain: Arc<PublishDrain>,
}

impl Publisher {
    pub fn new(instance: Arc<MqttInstance>) -> Self {
        let publish_drain = instance.publish_drain();
        Self {
            instance,
            publish_drain,
        }
    }

    /// Publishes `data` as a JSON object on `topic`.
    ///
    /// # Errors
    ///
    /// - `InvalidMetadata` for an empty topic or QoS above 2
    /// - `NotConnected` when the connection is down, shutting down, or is lost
    ///   for good before the broker acknowledges
    /// - `Serialization` when `data` cannot be encoded
    /// - `ClientTransfer` when the request cannot be queued
    pub async fn publish<T: Serialize + Sync>(
        &self,
        data: &T,
        topic: &str,
        qos: u8,
    ) -> Result<(), TransferError> {
        let _guard = self.publish_drain.enter();

        if topic.is_empty() {
            return Err(TransferError::InvalidMetadata("Topic must not be empty".into()));
        }
        let qos = qos_from_u8(qos)?;

        if self.instance.cancel_token().is_cancelled() {
            return Err(TransferError::NotConnected("shutting down".into()));
        }
        let current = self.instance.state();
        if !current.is_connected() {
            return Err(TransferError::NotConnected(current.to_string()));
        }

        let payload =
            serde_json::to_vec(data).map_err(|e| TransferError::Serialization(e.to_string()))?;

        debug!("Publishing {} bytes to '{}'", payload.len(), topic);

        let mut acks = self.instance.ack_receiver();
        acks.mark_unchanged();

        self.instance
            .client()
            .publish(topic, qos, false, payload)
            .await?;

        if qos == QoS::AtMostOnce {
            return Ok(());
        }

        let mut state = self.instance.state_receiver();
        let lost = async { state.wait_for(ConnectionState::is_terminal).await.is_ok() };

        tokio::select! {
            acked = acks.changed() => acked
                .map_err(|_| TransferError::NotConnected("connection kernel stopped".into())),
            _ = lost => Err(TransferError::NotConnected(self.instance.state().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;
    use crate::{config::Config, manager::MqttManager, test_broker::TestBroker};

    #[derive(Serialize)]
    struct Reading {
        #[serde(rename = "deviceId")]
        device_id: &'static str,
        temp: f64,
    }

    async fn connected_instance(port: u16) -> Arc<MqttInstance> {
        let config = Config {
            host: "127.0.0.1".into(),
            port,
            client_id: "dev1".into(),
            ..Default::default()
        };
        let instance = MqttManager::from_config(config)
            .unwrap()
            .build_and_start()
            .await
            .unwrap();
        instance.wait_connected().await.unwrap();
        Arc::new(instance)
    }

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(
            qos_from_u8(3),
            Err(TransferError::InvalidMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_json_acknowledged() {
        let mut broker = TestBroker::accepting().await;
        let instance = connected_instance(broker.port()).await;
        let publisher = Publisher::new(Arc::clone(&instance));

        let reading = Reading {
            device_id: "dev1",
            temp: 21.5,
        };
        publisher
            .publish(&reading, "devices/dev1/messages/events/", 1)
            .await
            .unwrap();

        let (topic, payload) = broker.next_publish().await.unwrap();
        assert_eq!(topic, "devices/dev1/messages/events/");
        assert_eq!(payload, br#"{"deviceId":"dev1","temp":21.5}"#);
        assert_eq!(instance.publish_drain().inflight(), 0);

        instance.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_fails() {
        let broker = TestBroker::accepting().await;
        let instance = connected_instance(broker.port()).await;
        let publisher = Publisher::new(Arc::clone(&instance));

        instance.shutdown().await.unwrap();

        let err = publisher.publish(&1u8, "t", 1).await.unwrap_err();
        assert!(matches!(err, TransferError::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_topic() {
        let broker = TestBroker::accepting().await;
        let instance = connected_instance(broker.port()).await;
        let publisher = Publisher::new(Arc::clone(&instance));

        let err = publisher.publish(&1u8, "", 0).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidMetadata(_)));

        instance.shutdown().await.unwrap();
    }
}
