//! Session phase tracking.
//!
//! The publish session reports every phase change here. Observers (main,
//! tests) subscribe to a `watch` channel and see the latest phase.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

/// Phases of a publish session, in order. `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Running,
    Draining,
    Terminated,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Connecting => "Connecting",
            SessionPhase::Running => "Running",
            SessionPhase::Draining => "Draining",
            SessionPhase::Terminated => "Terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Terminated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The session's view of its collector connection.
///
/// Moves forward only: it never returns to `Connecting` once `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

/// Shared phase tracker.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    phase_tx: watch::Sender<SessionPhase>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self { phase_tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn current(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    /// Moves to `phase`, logging the transition.
    pub fn set_phase(&self, phase: SessionPhase) {
        let old = self.phase_tx.send_replace(phase);
        if old != phase {
            info!("Session phase: {} -> {}", old, phase);
        }
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs broker connection changes for as long as the transport runs.
#[cfg(feature = "sensorbee-mqtt")]
pub fn watch_transport(
    mut state_rx: watch::Receiver<sensorbee_mqtt::ConnectionState>,
) -> tokio::task::JoinHandle<()> {
    use tracing::{debug, warn};

    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            match &state {
                sensorbee_mqtt::ConnectionState::Reconnecting(secs) => {
                    warn!("Broker connection lost, reconnecting in {:.1} sec", secs)
                }
                sensorbee_mqtt::ConnectionState::Disconnected(reason) => {
                    warn!("Broker disconnected: {}", reason)
                }
                other => debug!("Broker connection: {}", other),
            }
            if state.is_terminal() {
                break;
            }
        }
        debug!("Transport state channel closed");
    })
}
