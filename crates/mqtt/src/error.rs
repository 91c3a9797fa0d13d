//! Error handling for the MQTT collector transport.
//!
//! `TransferError` is the single error type returned by every fallible
//! operation in this crate. Variants fall into three groups:
//!
//! **Setup** (caught before the session starts):
//! - `ClientSetup`, `ConfigError`, `Io`
//!
//! **Connect** (first connection attempt, fatal to a session):
//! - `Connect`, `ConnectTimeout`, `ClientConnection`, `RetriesPolicy`
//!
//! **Publish** (per message, never fatal to a session):
//! - `Serialization`, `InvalidMetadata`, `NotConnected`, `ClientTransfer`

use std::time::Duration;

use thiserror::Error;

/// The unified error type for MQTT transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Publish parameters are invalid (QoS outside 0..=2, empty topic).
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The message could not be encoded to JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// MQTT client initialization failed.
    ///
    /// Typically a missing CA certificate or an incomplete client identity.
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// The local client could not queue a request (event loop gone, channel closed).
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// The connection to the broker failed or was lost.
    ///
    /// Boxed to keep the enum small.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// The broker did not accept the first connection attempt.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// No connection outcome arrived within the configured timeout.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A publish was attempted while the connection is down.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Reconnection attempts are exhausted.
    #[error("Retry policy error: {0}")]
    RetriesPolicy(#[from] super::backoff::BackoffError),

    /// Local file I/O failed (certificate loading).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}

impl TransferError {
    /// Returns true for errors raised while establishing the first connection.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            TransferError::Connect(_)
                | TransferError::ConnectTimeout(_)
                | TransferError::ClientConnection(_)
                | TransferError::RetriesPolicy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_display() {
        let err = TransferError::InvalidMetadata("QoS must be 0-2".into());
        assert_eq!(err.to_string(), "Invalid metadata: QoS must be 0-2");
    }

    #[test]
    fn test_connect_timeout_display() {
        let err = TransferError::ConnectTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Connect timed out after 30s");
    }

    #[test]
    fn test_transfer_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let transfer_err: TransferError = io_err.into();
        assert!(transfer_err.to_string().contains("file not found"));
        assert!(!transfer_err.is_connect_failure());
    }

    #[test]
    fn test_connect_failure_classification() {
        assert!(TransferError::Connect("refused".into()).is_connect_failure());
        assert!(TransferError::ConnectTimeout(Duration::from_secs(1)).is_connect_failure());
        assert!(!TransferError::NotConnected("down".into()).is_connect_failure());
        assert!(!TransferError::Serialization("bad".into()).is_connect_failure());
    }
}
