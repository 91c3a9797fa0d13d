//! Connection kernel: drives the rumqttc event loop and owns the state.
//!
//! ```text
//! MqttCollector ──publish──▶ AsyncClient ──requests──▶ EventLoop ◀──poll── ConnectionKernel
//!                                                                               │
//!                                                              watch<ConnectionState>
//! ```
//!
//! The kernel treats the first connection attempt differently from later
//! ones. Until the broker has accepted the session once, any error ends the
//! kernel with `Failed`; the caller decides what to do with a device that
//! cannot connect. After that, transient errors are retried with
//! exponential backoff.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{backoff::Backoff, error::TransferError, state::ConnectionState};

/// Upper bound for flushing DISCONNECT on shutdown.
const DISCONNECT_FLUSH: Duration = Duration::from_secs(2);

/// Runs the MQTT event loop on a single task.
pub struct ConnectionKernel {
    client: AsyncClient,
    event_loop: EventLoop,
    backoff: Backoff,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,

    /// Incremented for every PUBACK/PUBCOMP.
    acks_tx: watch::Sender<u64>,

    /// Set by the first successful CONNACK, never cleared.
    established: bool,
}

impl ConnectionKernel {
    pub fn new(
        client: AsyncClient,
        event_loop: EventLoop,
        backoff: Backoff,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let (acks_tx, _) = watch::channel(0);
        Self {
            client,
            event_loop,
            backoff,
            cancel,
            state_tx,
            acks_tx,
            established: false,
        }
    }

    /// Receiver that observes every state change, starting with the current one.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Receiver whose value grows by one per acknowledged QoS 1/2 publish.
    pub fn subscribe_acks(&self) -> watch::Receiver<u64> {
        self.acks_tx.subscribe()
    }

    fn update_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if changed {
            info!("Connection state changed to: {}", state);
        }
    }

    /// Polls the event loop until cancelled or the connection is lost for good.
    ///
    /// # Errors
    ///
    /// - `Connect` when the first attempt fails
    /// - `ClientConnection` on a fatal error after the session was established
    /// - `RetriesPolicy` when reconnect attempts are exhausted
    pub async fn run(&mut self) -> Result<(), TransferError> {
        self.update_state(ConnectionState::Connecting);
        debug!("Starting connection event loop");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested, closing connection");
                    self.disconnect().await;
                    self.update_state(ConnectionState::Closed);
                    return Ok(());
                }

                event = self.event_loop.poll() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(e) => self.handle_error(e).await?,
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(conn_ack)) => {
                if conn_ack.code == ConnectReturnCode::Success {
                    if self.established {
                        info!("Connection re-established");
                    }
                    self.established = true;
                    self.backoff.reset();
                    self.update_state(ConnectionState::Connected);
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("Disconnected by broker");
                self.update_state(ConnectionState::Disconnected("Disconnected by broker".into()));
            }
            Event::Incoming(Packet::PubAck(ack)) => {
                trace!(pkid = ack.pkid, "Publish acknowledged");
                self.acks_tx.send_modify(|count| *count += 1);
            }
            Event::Incoming(Packet::PubComp(comp)) => {
                trace!(pkid = comp.pkid, "Publish completed");
                self.acks_tx.send_modify(|count| *count += 1);
            }
            Event::Incoming(packet) => trace!("Incoming packet: {:?}", packet),
            Event::Outgoing(outgoing) => trace!("Outgoing packet: {:?}", outgoing),
        }
    }

    async fn handle_error(&mut self, e: ConnectionError) -> Result<(), TransferError> {
        let reason = get_error_message(&e);

        if !self.established {
            debug!("First connection attempt failed: {e:?}");
            self.update_state(ConnectionState::Failed(reason.clone()));
            return Err(TransferError::Connect(reason));
        }

        if is_fatal_error(&e) {
            error!("Fatal connection error: {}", reason);
            self.update_state(ConnectionState::Failed(reason));
            return Err(TransferError::from(e));
        }

        self.update_state(ConnectionState::Disconnected(reason.clone()));

        match self.backoff.next_sleep() {
            Ok(delay) => {
                warn!(
                    "Reconnecting in {:.2} seconds due to error: {}",
                    delay.as_secs_f64(),
                    reason
                );
                self.update_state(ConnectionState::Reconnecting(delay.as_secs_f64()));
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => self.update_state(ConnectionState::Connecting),
                }
                Ok(())
            }
            Err(backoff_err) => {
                error!("Giving up on reconnection: {}", backoff_err);
                self.update_state(ConnectionState::Failed(backoff_err.to_string()));
                Err(TransferError::RetriesPolicy(backoff_err))
            }
        }
    }

    /// Best-effort DISCONNECT, flushed through the event loop when connected.
    async fn disconnect(&mut self) {
        if !self.state_tx.borrow().is_connected() {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!("Error queueing disconnect packet: {:?}", e);
            return;
        }

        let flush = async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_FLUSH, flush).await.is_err() {
            debug!("Disconnect flush timed out");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Fatal,
    Reconnect,
}

fn classify_connection_error(err: &ConnectionError) -> Disposition {
    use Disposition::*;

    match err {
        // Broken certificates or crypto setup will not fix themselves.
        ConnectionError::Tls(_) => Fatal,
        ConnectionError::MqttState(_) => Fatal,
        ConnectionError::NotConnAck(_) => Fatal,
        ConnectionError::RequestsDone => Fatal,

        ConnectionError::Io(e) => match e.kind() {
            std::io::ErrorKind::AddrInUse
            | std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::InvalidData => Fatal,
            _ => Reconnect,
        },

        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => Reconnect,

        ConnectionError::ConnectionRefused(code) => match code {
            ConnectReturnCode::RefusedProtocolVersion
            | ConnectReturnCode::BadClientId
            | ConnectReturnCode::BadUserNamePassword
            | ConnectReturnCode::NotAuthorized => Fatal,
            _ => Reconnect,
        },

        #[allow(unreachable_patterns)]
        _ => Reconnect,
    }
}

fn is_fatal_error(err: &ConnectionError) -> bool {
    matches!(classify_connection_error(err), Disposition::Fatal)
}

/// Innermost message of an error chain, without surrounding quotes.
fn get_error_message(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}
