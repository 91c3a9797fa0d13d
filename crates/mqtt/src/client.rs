//! MQTT client construction from the transport configuration.
//!
//! `ClientBuilder` turns a validated [`Config`] into rumqttc's
//! `AsyncClient`/`EventLoop` pair. Credentials come from the applied
//! device identity:
//!
//! - `Password` sets CONNECT username/password
//! - `Certificate` supplies the client certificate and key to TLS from memory,
//!   superseding `client_cert_path`/`client_key_path`
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::from_config(&config)?.build()?;
//! ```

use std::{fs, time::Duration};

use rumqttc::{AsyncClient, EventLoop, MqttOptions, TlsConfiguration, Transport};

use super::{
    config::{ClientAuth, Config, TlsConfig},
    error::TransferError,
};

/// Builder for the client/event loop pair.
///
/// Consumed by [`ClientBuilder::build`]. The client is cheap to clone and is
/// shared by publishers; the event loop must be polled by exactly one task.
pub struct ClientBuilder {
    opts: MqttOptions,

    /// Capacity of the request channel between client and event loop.
    cap: usize,

    tls_config: Option<TlsConfig>,

    /// In-memory client certificate and key from the device identity.
    client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl ClientBuilder {
    /// Creates a builder for a plain TCP connection.
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16, cap: usize) -> Self {
        Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
            tls_config: None,
            client_auth: None,
        }
    }

    /// Creates a builder from a `Config`, applying its identity.
    ///
    /// # Errors
    ///
    /// `TransferError::ClientSetup` when the host is empty.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        if config.host.is_empty() {
            return Err(TransferError::ClientSetup("Host must not be empty".into()));
        }

        let client_id = if config.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.client_id.clone()
        };

        let mut builder = Self::new(
            client_id,
            config.host.clone(),
            config.port,
            config.request_channel_capacity.unwrap_or(10) as usize,
        )
        .keep_alive(config.keep_alive)
        .clean_session(config.clean_session)
        .max_inflight(config.max_inflight);

        if let Some(max_packet_size) = config.max_packet_size {
            builder = builder.max_packet_size(max_packet_size as usize, max_packet_size as usize);
        }

        builder.tls_config = config.tls.clone().filter(TlsConfig::is_enabled);

        if let Some(identity) = &config.identity {
            match &identity.auth {
                ClientAuth::Anonymous => {}
                ClientAuth::Password { username, password } => {
                    builder = builder.credentials(username.clone(), password.clone());
                }
                ClientAuth::Certificate { cert_pem, key_pem } => {
                    builder.client_auth = Some((cert_pem.clone(), key_pem.clone()));
                }
            }
        }

        Ok(builder)
    }

    /// Configures TLS verified by `ca_cert_path`.
    pub fn with_tls_ca_only(mut self, ca_cert_path: impl Into<String>) -> Self {
        self.tls_config = Some(TlsConfig::with_ca_only(ca_cert_path));
        self
    }

    /// Supplies an in-memory client certificate and key (PEM).
    pub fn with_client_identity(mut self, cert_pem: Vec<u8>, key_pem: Vec<u8>) -> Self {
        self.client_auth = Some((cert_pem, key_pem));
        self
    }

    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    pub fn max_packet_size(mut self, incoming: usize, outgoing: usize) -> Self {
        self.opts.set_max_packet_size(incoming, outgoing);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    /// Sets CONNECT username and password. Only send these over TLS.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.set_credentials(username, password);
        self
    }

    pub fn max_inflight(mut self, max: u16) -> Self {
        self.opts.set_inflight(max);
        self
    }

    fn build_tls_transport(&self, tls_config: &TlsConfig) -> Result<Transport, TransferError> {
        tls_config
            .validate_config()
            .map_err(|e| TransferError::ClientSetup(format!("Invalid TLS configuration: {e}")))?;

        let ca_path = tls_config
            .ca_cert_path
            .as_deref()
            .ok_or_else(|| TransferError::ClientSetup("CA certificate path is not set".into()))?;
        let ca = fs::read(ca_path)?;

        let client_auth = match (&self.client_auth, tls_config) {
            (Some(identity), _) => Some(identity.clone()),
            (
                None,
                TlsConfig {
                    client_cert_path: Some(cert),
                    client_key_path: Some(key),
                    ..
                },
            ) => Some((fs::read(cert)?, fs::read(key)?)),
            _ => None,
        };

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        }))
    }

    /// Constructs the client and its event loop.
    ///
    /// # Errors
    ///
    /// - `ClientSetup` when a client certificate is present without TLS, or
    ///   the TLS section is invalid
    /// - `Io` when a certificate file cannot be read
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let transport = match &self.tls_config {
            Some(tls_config) => self.build_tls_transport(tls_config)?,
            None if self.client_auth.is_some() => {
                return Err(TransferError::ClientSetup(
                    "Client certificate requires a TLS configuration with a CA certificate".into(),
                ));
            }
            None => Transport::Tcp,
        };

        let mut opts = self.opts;
        opts.set_transport(transport);

        Ok(AsyncClient::new(opts, self.cap))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;
    use crate::config::ClientIdentity;

    struct TestFiles {
        _temp_dir: TempDir,
        ca_cert: String,
        client_cert: String,
        client_key: String,
    }

    impl TestFiles {
        fn new() -> std::io::Result<Self> {
            let temp_dir = TempDir::new()?;

            let ca_cert = temp_dir.path().join("ca.pem");
            let client_cert = temp_dir.path().join("dev1-cert.pem");
            let client_key = temp_dir.path().join("dev1-key.pem");

            File::create(&ca_cert)?.write_all(b"ca certificate content")?;
            File::create(&client_cert)?.write_all(b"client certificate content")?;
            File::create(&client_key)?.write_all(b"client key content")?;

            Ok(TestFiles {
                _temp_dir: temp_dir,
                ca_cert: ca_cert.to_string_lossy().into_owned(),
                client_cert: client_cert.to_string_lossy().into_owned(),
                client_key: client_key.to_string_lossy().into_owned(),
            })
        }
    }

    #[test]
    fn test_build_tcp_client() {
        let result = ClientBuilder::new("dev1", "localhost", 1883, 10)
            .keep_alive(30)
            .credentials("user", "pass")
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_from_config_rejects_empty_host() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        assert!(ClientBuilder::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_with_password_identity() {
        let mut config = Config {
            port: 1883,
            ..Default::default()
        };
        config.apply_identity(
            "hub.local",
            ClientIdentity {
                device_id: "dev1".into(),
                auth: ClientAuth::Password {
                    username: "hub.local/dev1".into(),
                    password: "SharedAccessSignature sr=x".into(),
                },
            },
        );

        let builder = ClientBuilder::from_config(&config).unwrap();
        assert_eq!(builder.opts.client_id(), "dev1");
        assert!(builder.client_auth.is_none());
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_certificate_identity_without_tls_fails() {
        let result = ClientBuilder::new("dev1", "localhost", 8883, 10)
            .with_client_identity(b"cert".to_vec(), b"key".to_vec())
            .build();
        assert!(matches!(result, Err(TransferError::ClientSetup(_))));
    }

    #[test]
    fn test_certificate_identity_with_tls() {
        let files = TestFiles::new().unwrap();
        let result = ClientBuilder::new("dev1", "localhost", 8883, 10)
            .with_tls_ca_only(&files.ca_cert)
            .with_client_identity(b"cert".to_vec(), b"key".to_vec())
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_identity_supersedes_certificate_paths() {
        let files = TestFiles::new().unwrap();
        let builder = ClientBuilder::new("dev1", "localhost", 8883, 10)
            .with_client_identity(b"in-memory".to_vec(), b"key".to_vec());
        let tls = TlsConfig::new(&files.ca_cert, &files.client_cert, &files.client_key);

        match builder.build_tls_transport(&tls).unwrap() {
            Transport::Tls(TlsConfiguration::Simple { client_auth, .. }) => {
                let (cert, _) = client_auth.unwrap();
                assert_eq!(cert, b"in-memory");
            }
            _ => panic!("expected simple TLS transport"),
        }
    }

    #[test]
    fn test_build_tls_missing_ca() {
        let result = ClientBuilder::new("dev1", "localhost", 8883, 10)
            .with_tls_ca_only("/nonexistent/ca.pem")
            .build();
        assert!(result.is_err());
    }
}
