//! Configuration for the MQTT collector connection.
//!
//! Loaded from the `[transport]` table of the agent configuration. Every
//! field has a default, so a partial table is valid. The device identity
//! (client id, credentials, client certificate) is normally applied after
//! loading through [`Config::apply_identity`], because it comes from the
//! connection descriptor rather than from the file.
//!
//! ```toml
//! [transport]
//! host = "hub.example.net"
//! port = 8883
//! keep_alive = 60
//! connection_timeout = 30
//!
//! [transport.tls]
//! ca_cert_path = "/etc/sensorbee/ca.pem"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Main MQTT connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address. Overridden by the identity's host name.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port. 8883 for MQTT over TLS, 1883 for plain TCP.
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Seconds to wait for the first CONNACK before the connect is reported as failed.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Ask the broker to discard previous session state.
    pub clean_session: bool,

    /// Maximum number of unacknowledged QoS 1/2 publishes.
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max inflight must be between 1 and 1000"
    ))]
    pub max_inflight: u16,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Client identifier. Empty means "use the device id", or a random UUID
    /// when no identity was applied.
    #[validate(length(max = 128, message = "Client ID must not exceed 128 characters"))]
    pub client_id: String,

    /// Maximum MQTT packet size in bytes, both directions.
    #[validate(range(
        min = 64,
        max = 65535,
        message = "Max packet size must be between 64 and 65535 bytes"
    ))]
    pub max_packet_size: Option<u16>,

    /// Capacity of the client request channel.
    #[validate(range(
        min = 1,
        max = 255,
        message = "Request channel capacity must be between 1 and 255"
    ))]
    pub request_channel_capacity: Option<u8>,

    /// Initial delay (seconds) before reconnecting a dropped connection.
    #[validate(range(
        min = 1,
        max = 60,
        message = "Reconnect delay must be between 1 and 60 seconds"
    ))]
    pub reconnect_delay: u64,

    /// Upper bound (seconds) for the reconnect delay.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Reconnect max delay must be between 1 and 3600 seconds"
    ))]
    pub reconnect_max_delay: u64,

    /// Maximum reconnection attempts after a drop. 0 retries forever.
    #[validate(range(max = 100, message = "Max reconnect attempts must not exceed 100"))]
    pub max_reconnect_attempts: u32,

    /// Growth factor applied to the reconnect delay after each attempt.
    #[validate(range(
        min = 1.0,
        max = 30.0,
        message = "Reconnect backoff multiplier must be between 1 and 30"
    ))]
    pub reconnect_backoff_multiplier: f64,

    /// TLS settings. Required when the identity carries a client certificate.
    #[validate(nested)]
    pub tls: Option<TlsConfig>,

    /// Resolved device identity. Never read from or written to the file.
    #[serde(skip)]
    pub identity: Option<ClientIdentity>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 8883,
            connection_timeout: 30,
            clean_session: true,
            max_inflight: 10,
            keep_alive: 60,
            client_id: String::new(),
            max_packet_size: Some(65_535),
            request_channel_capacity: Some(10),
            reconnect_delay: 1,
            reconnect_max_delay: 60,
            max_reconnect_attempts: 0,
            reconnect_backoff_multiplier: 2.0,
            tls: None,
            identity: None,
        }
    }
}

impl Config {
    /// Applies a resolved device identity.
    ///
    /// The identity's host replaces `host` and its device id becomes the
    /// client id unless one was configured explicitly.
    pub fn apply_identity(&mut self, host: impl Into<String>, identity: ClientIdentity) {
        self.host = host.into();
        if self.client_id.is_empty() {
            self.client_id = identity.device_id.clone();
        }
        self.identity = Some(identity);
    }

    /// Checks the cross-field rules that `validator` attributes cannot express.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when a client certificate is present
    /// without a usable TLS section, or the TLS section itself is invalid.
    pub fn validate_identity(&self) -> Result<(), ValidationError> {
        let needs_tls = self
            .identity
            .as_ref()
            .is_some_and(|identity| matches!(identity.auth, ClientAuth::Certificate { .. }));

        match &self.tls {
            Some(tls) if tls.is_enabled() => tls.validate_config(),
            _ if needs_tls => Err(ValidationError::new("missing_tls").with_message(
                "Certificate authentication requires [transport.tls] with ca_cert_path".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// The device identity as seen by the transport.
///
/// Secrets stay opaque: they are handed to the MQTT client unchanged.
#[derive(Clone)]
pub struct ClientIdentity {
    /// Device identifier, also used as the default client id.
    pub device_id: String,

    /// How the device authenticates.
    pub auth: ClientAuth,
}

/// Authentication material for the broker connection.
#[derive(Clone)]
pub enum ClientAuth {
    /// No credentials beyond the client id.
    Anonymous,

    /// Username/password pair sent in CONNECT.
    Password { username: String, password: String },

    /// PEM client certificate and private key, already loaded.
    Certificate { cert_pem: Vec<u8>, key_pem: Vec<u8> },
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.auth {
            ClientAuth::Anonymous => "anonymous",
            ClientAuth::Password { .. } => "password",
            ClientAuth::Certificate { .. } => "certificate",
        };
        f.debug_struct("ClientIdentity")
            .field("device_id", &self.device_id)
            .field("auth", &auth)
            .finish()
    }
}

/// TLS settings for the broker connection.
///
/// File paths are checked by [`TlsConfig::validate_config`], which runs
/// before the client is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TlsConfig {
    /// CA certificate (PEM) used to verify the broker.
    pub ca_cert_path: Option<String>,

    /// Client certificate (PEM) on disk. Ignored when the identity carries one.
    pub client_cert_path: Option<String>,

    /// Client private key (PEM) on disk. Ignored when the identity carries one.
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    /// CA-only verification.
    pub fn with_ca_only(ca_cert_path: impl Into<String>) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: None,
            client_key_path: None,
        }
    }

    /// Mutual TLS with certificate files on disk.
    pub fn new(
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: Some(client_cert_path.into()),
            client_key_path: Some(client_key_path.into()),
        }
    }

    /// TLS is enabled by the presence of a CA certificate.
    pub fn is_enabled(&self) -> bool {
        self.ca_cert_path.is_some()
    }

    /// Validates presence and readability of the configured files.
    ///
    /// # Errors
    ///
    /// `missing_ca_cert`, `incomplete_client_auth`, or a file error from
    /// [`validate_file_path`].
    pub fn validate_config(&self) -> Result<(), ValidationError> {
        let Some(ca) = self.ca_cert_path.as_deref() else {
            return Err(ValidationError::new("missing_ca_cert")
                .with_message("CA certificate path is required".into()));
        };
        validate_file_path(ca)?;

        match (
            self.client_cert_path.as_deref(),
            self.client_key_path.as_deref(),
        ) {
            (Some(cert), Some(key)) => {
                validate_file_path(cert)?;
                validate_file_path(key)
            }
            (None, None) => Ok(()),
            _ => Err(ValidationError::new("incomplete_client_auth").with_message(
                "Both client certificate and key must be provided or neither".into(),
            )),
        }
    }
}

/// Checks that `path` is non-empty, exists, and is a regular file.
fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {path}").into()));
    }

    if !path_obj.is_file() {
        return Err(ValidationError::new("not_a_file")
            .with_message(format!("Path is not a file: {path}").into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.validate_identity().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("host = \"hub.local\"\nport = 1883").unwrap();
        assert_eq!(config.host, "hub.local");
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive, 60);
        assert!(config.identity.is_none());
    }

    #[test]
    fn test_invalid_keep_alive_rejected() {
        let config = Config {
            keep_alive: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_identity_sets_client_id() {
        let mut config = Config::default();
        config.apply_identity(
            "hub.example.net",
            ClientIdentity {
                device_id: "dev1".into(),
                auth: ClientAuth::Anonymous,
            },
        );
        assert_eq!(config.host, "hub.example.net");
        assert_eq!(config.client_id, "dev1");
    }

    #[test]
    fn test_apply_identity_keeps_explicit_client_id() {
        let mut config = Config {
            client_id: "custom".into(),
            ..Default::default()
        };
        config.apply_identity(
            "hub",
            ClientIdentity {
                device_id: "dev1".into(),
                auth: ClientAuth::Anonymous,
            },
        );
        assert_eq!(config.client_id, "custom");
    }

    #[test]
    fn test_certificate_identity_requires_tls() {
        let mut config = Config::default();
        config.apply_identity(
            "hub",
            ClientIdentity {
                device_id: "dev1".into(),
                auth: ClientAuth::Certificate {
                    cert_pem: b"cert".to_vec(),
                    key_pem: b"key".to_vec(),
                },
            },
        );
        assert!(config.validate_identity().is_err());

        let mut ca = NamedTempFile::new().unwrap();
        ca.write_all(b"ca").unwrap();
        config.tls = Some(TlsConfig::with_ca_only(ca.path().to_string_lossy()));
        assert!(config.validate_identity().is_ok());
    }

    #[test]
    fn test_tls_incomplete_client_auth() {
        let mut ca = NamedTempFile::new().unwrap();
        ca.write_all(b"ca").unwrap();
        let tls = TlsConfig {
            ca_cert_path: Some(ca.path().to_string_lossy().into_owned()),
            client_cert_path: Some("/tmp/cert.pem".into()),
            client_key_path: None,
        };
        let err = tls.validate_config().unwrap_err();
        assert_eq!(err.code, "incomplete_client_auth");
    }

    #[test]
    fn test_tls_missing_file() {
        let tls = TlsConfig::with_ca_only("/nonexistent/ca.pem");
        let err = tls.validate_config().unwrap_err();
        assert_eq!(err.code, "file_not_found");
    }

    #[test]
    fn test_identity_debug_hides_secrets() {
        let identity = ClientIdentity {
            device_id: "dev1".into(),
            auth: ClientAuth::Password {
                username: "u".into(),
                password: "secret".into(),
            },
        };
        let debug = format!("{:?}", identity);
        assert!(debug.contains("dev1"));
        assert!(!debug.contains("secret"));
    }
}
