//! Observable state of the broker connection.
//!
//! The connection kernel publishes every transition on a `watch` channel;
//! [`crate::MqttInstance::wait_connected`] and the publisher read it.
//!
//! ```text
//! Connecting ──ConnAck──▶ Connected ──drop──▶ Disconnected ──▶ Reconnecting ──▶ Connecting
//!     │                                                             │
//!     └──────first attempt fails──────▶ Failed ◀────retries exhausted┘
//!
//! any state ──shutdown──▶ Closed
//! ```

use std::fmt;

/// Current state of the broker connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// CONNECT sent, waiting for CONNACK.
    Connecting,

    /// The broker accepted the session. The only state in which publishes go out.
    Connected,

    /// An established connection dropped. A reconnect follows.
    Disconnected(String),

    /// Waiting the given number of seconds before the next reconnect.
    Reconnecting(f64),

    /// The connection cannot be (re)established. Terminal.
    Failed(String),

    /// Closed by the local side. Terminal.
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected(_) => "Disconnected",
            ConnectionState::Reconnecting(_) => "Reconnecting",
            ConnectionState::Failed(_) => "Failed",
            ConnectionState::Closed => "Closed",
        }
    }

    /// Reason or delay attached to the state, empty when there is none.
    pub fn details(&self) -> String {
        match self {
            ConnectionState::Disconnected(reason) | ConnectionState::Failed(reason) => {
                reason.clone()
            }
            ConnectionState::Reconnecting(seconds) => format!("in {seconds} seconds"),
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Closed => {
                String::new()
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting(_)
        )
    }

    /// True once no further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed(_) | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        let details = self.details();
        if !details.is_empty() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionState::Reconnecting(2.0).to_string(),
            "Reconnecting (in 2 seconds)"
        );
        assert_eq!(
            ConnectionState::Failed("not authorized".into()).to_string(),
            "Failed (not authorized)"
        );
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Failed("x".into()).is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::Disconnected("x".into()).is_terminal());
        assert!(!ConnectionState::Reconnecting(1.0).is_terminal());
    }

    #[test]
    fn test_is_connecting() {
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting(1.0).is_connecting());
        assert!(!ConnectionState::Connected.is_connecting());
        assert!(!ConnectionState::Closed.is_connecting());
    }
}
