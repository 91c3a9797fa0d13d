//! Entry point tying the client, connection kernel and publish drain together.
//!
//! ```ignore
//! let instance = MqttManager::from_config(config)?.build_and_start().await?;
//! instance.wait_connected().await?;
//!
//! let publisher = Publisher::new(Arc::new(instance.clone()));
//! publisher.publish(&message, "devices/dev1/messages/events/", 1).await?;
//!
//! instance.shutdown().await?;
//! ```

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use rumqttc::AsyncClient;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use validator::Validate;

use super::{
    backoff::Backoff, client::ClientBuilder, config::Config, connection::ConnectionKernel,
    error::TransferError, state::ConnectionState,
};

/// How long `shutdown` waits for the kernel to report `Closed`.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Counts in-flight publishes so shutdown can wait for them.
#[derive(Debug, Default)]
pub struct PublishDrain {
    inflight: AtomicUsize,
    idle: Notify,
}

impl PublishDrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a publish; it stays in flight until the guard drops.
    pub fn enter(self: &Arc<Self>) -> PublishGuard {
        self.inflight.fetch_add(1, Ordering::AcqRel);
        PublishGuard {
            drain: Arc::clone(self),
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.inflight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct PublishGuard {
    drain: Arc<PublishDrain>,
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        if self.drain.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drain.idle.notify_waiters();
        }
    }
}

/// Validated transport configuration, ready to start.
pub struct MqttManager {
    config: Config,
}

impl MqttManager {
    /// Validates `config`, including TLS and identity consistency.
    ///
    /// # Errors
    ///
    /// `ConfigError` for field violations, `ClientSetup` for an identity that
    /// the TLS section cannot carry.
    pub fn from_config(config: Config) -> Result<Self, TransferError> {
        config.validate()?;
        config
            .validate_identity()
            .map_err(|e| TransferError::ClientSetup(e.to_string()))?;
        Ok(Self { config })
    }

    /// Builds the client and spawns the connection kernel.
    ///
    /// Returns as soon as the kernel is running; the connection outcome is
    /// observed through [`MqttInstance::wait_connected`].
    pub async fn build_and_start(self) -> Result<MqttInstance, TransferError> {
        let (client, event_loop) = ClientBuilder::from_config(&self.config)?.build()?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            "Starting MQTT connection"
        );

        let connection_cancel = CancellationToken::new();
        let mut kernel = ConnectionKernel::new(
            client.clone(),
            event_loop,
            Backoff::from_config(&self.config),
            connection_cancel.clone(),
        );
        let state = kernel.subscribe_state();
        let acks = kernel.subscribe_acks();

        tokio::spawn(async move {
            if let Err(e) = kernel.run().await {
                error!("MQTT connection kernel stopped: {}", e);
            }
        });

        Ok(MqttInstance {
            client,
            state,
            acks,
            cancel_token: CancellationToken::new(),
            connection_cancel,
            publish_drain: Arc::new(PublishDrain::new()),
            connection_timeout: Duration::from_secs(self.config.connection_timeout),
        })
    }
}

/// A running broker connection.
#[derive(Debug, Clone)]
pub struct MqttInstance {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,

    /// Running count of acknowledgements (PUBACK/PUBCOMP) from the broker.
    acks: watch::Receiver<u64>,

    /// Shutdown requested; publishes are refused from here on.
    cancel_token: CancellationToken,

    /// Stops the kernel. Fired only after the publish drain is idle.
    connection_cancel: CancellationToken,

    publish_drain: Arc<PublishDrain>,
    connection_timeout: Duration,
}

impl MqttInstance {
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn ack_receiver(&self) -> watch::Receiver<u64> {
        self.acks.clone()
    }

    pub fn publish_drain(&self) -> Arc<PublishDrain> {
        Arc::clone(&self.publish_drain)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Waits for the outcome of the first connection attempt.
    ///
    /// # Errors
    ///
    /// - `ConnectTimeout` when nothing is decided within `connection_timeout`
    /// - `Connect` when the broker refused or could not be reached
    pub async fn wait_connected(&self) -> Result<(), TransferError> {
        let mut state = self.state.clone();
        let decided = async {
            state
                .wait_for(|s| s.is_connected() || s.is_terminal())
                .await
                .map(|s| s.clone())
        };

        match tokio::time::timeout(self.connection_timeout, decided).await {
            Err(_) => Err(TransferError::ConnectTimeout(self.connection_timeout)),
            Ok(Ok(ConnectionState::Connected)) => Ok(()),
            Ok(Ok(other)) => Err(TransferError::Connect(other.details())),
            Ok(Err(_)) => Err(TransferError::Connect("connection kernel stopped".into())),
        }
    }

    /// Waits for in-flight publishes, then closes the connection.
    pub async fn shutdown(&self) -> Result<(), TransferError> {
        self.cancel_token.cancel();
        self.publish_drain.wait_idle().await;
        self.connection_cancel.cancel();

        let mut state = self.state.clone();
        let closed = async { state.wait_for(ConnectionState::is_terminal).await.is_ok() };
        if tokio::time::timeout(SHUTDOWN_WAIT, closed).await.is_err() {
            debug!("Connection kernel did not report closure in time");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_broker::TestBroker;

    fn loopback_config(port: u16) -> Config {
        Config {
            host: "127.0.0.1".into(),
            port,
            client_id: "dev1".into(),
            connection_timeout: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_config_validates() {
        let config = Config {
            keep_alive: 0,
            ..Default::default()
        };
        assert!(matches!(
            MqttManager::from_config(config),
            Err(TransferError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_drain_waits_for_guards() {
        let drain = Arc::new(PublishDrain::new());
        let guard = drain.enter();
        assert_eq!(drain.inflight(), 1);

        let waiter = {
            let drain = Arc::clone(&drain);
            tokio::spawn(async move { drain.wait_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(drain.inflight(), 0);
    }

    #[tokio::test]
    async fn test_wait_connected_succeeds() {
        let broker = TestBroker::accepting().await;
        let instance = MqttManager::from_config(loopback_config(broker.port()))
            .unwrap()
            .build_and_start()
            .await
            .unwrap();

        assert!(instance.wait_connected().await.is_ok());
        assert!(instance.state().is_connected());

        instance.shutdown().await.unwrap();
        assert_eq!(instance.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_wait_connected_reports_refusal() {
        let broker = TestBroker::refusing(5).await;
        let instance = MqttManager::from_config(loopback_config(broker.port()))
            .unwrap()
            .build_and_start()
            .await
            .unwrap();

        let err = instance.wait_connected().await.unwrap_err();
        assert!(err.is_connect_failure());
    }

    #[tokio::test]
    async fn test_wait_connected_unreachable() {
        let instance = MqttManager::from_config(loopback_config(TestBroker::unused_port()))
            .unwrap()
            .build_and_start()
            .await
            .unwrap();

        let err = instance.wait_connected().await.unwrap_err();
        assert!(matches!(err, TransferError::Connect(_)));
    }
}
