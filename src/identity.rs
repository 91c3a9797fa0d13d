//! Device identity: connection descriptor parsing and credential loading.
//!
//! A connection descriptor is a `;`-separated list of `Key=Value` pairs:
//!
//! ```text
//! HostName=hub.example.net;DeviceId=dev1;SharedAccessKey=c2VjcmV0
//! HostName=hub.example.net;DeviceId=dev1;x509=true
//! ```
//!
//! Values may themselves contain `=` (base64 keys do). Unknown keys are
//! ignored. With `x509=true` the client certificate and key are read from
//! `<DeviceId>-cert.pem` and `<DeviceId>-key.pem` in the credentials
//! directory. All secrets are kept as opaque bytes.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

/// Environment variable consulted when no descriptor is passed on the command line.
pub const CONNECTION_STRING_ENV: &str = "SENSORBEE_CONNECTION_STRING";

/// Environment variable naming the directory holding the x509 PEM files.
pub const CREDENTIALS_DIR_ENV: &str = "SENSORBEE_CREDENTIALS_DIR";

/// MQTT username suffix expected by IoT hubs speaking MQTT 3.1.1.
const API_VERSION: &str = "?api-version=2021-04-12";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Connection descriptor is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Malformed connection descriptor: {0}")]
    Malformed(String),

    #[error("Failed to load credential {path}")]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parsed connection descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host_name: String,
    pub device_id: String,
    pub shared_access_key: Option<String>,
    pub shared_access_signature: Option<String>,
    pub x509: bool,
    pub gateway_host_name: Option<String>,
}

impl ConnectionDescriptor {
    /// # Errors
    ///
    /// `Malformed` for a segment without `=` or an empty key, `MissingField`
    /// when `HostName` or `DeviceId` is absent or empty.
    pub fn parse(descriptor: &str) -> Result<Self, IdentityError> {
        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;
        let mut shared_access_signature = None;
        let mut x509 = false;
        let mut gateway_host_name = None;

        for segment in descriptor.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| IdentityError::Malformed(format!("segment without '=': {segment}")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(IdentityError::Malformed("empty key".into()));
            }
            let value = value.trim().to_string();

            match key {
                "HostName" => host_name = Some(value),
                "DeviceId" => device_id = Some(value),
                "SharedAccessKey" => shared_access_key = Some(value),
                "SharedAccessSignature" => shared_access_signature = Some(value),
                "x509" => x509 = value.eq_ignore_ascii_case("true"),
                "GatewayHostName" => gateway_host_name = Some(value),
                other => debug!("Ignoring connection descriptor key '{}'", other),
            }
        }

        let host_name = host_name
            .filter(|v| !v.is_empty())
            .ok_or(IdentityError::MissingField("HostName"))?;
        let device_id = device_id
            .filter(|v| !v.is_empty())
            .ok_or(IdentityError::MissingField("DeviceId"))?;

        Ok(ConnectionDescriptor {
            host_name,
            device_id,
            shared_access_key,
            shared_access_signature,
            x509,
            gateway_host_name,
        })
    }

    /// The host to open the connection to: the gateway when one is named.
    pub fn connect_host(&self) -> &str {
        self.gateway_host_name.as_deref().unwrap_or(&self.host_name)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("shared_access_key", &self.shared_access_key.as_ref().map(|_| "***"))
            .field(
                "shared_access_signature",
                &self.shared_access_signature.as_ref().map(|_| "***"),
            )
            .field("x509", &self.x509)
            .field("gateway_host_name", &self.gateway_host_name)
            .finish()
    }
}

/// How the device proves its identity.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Shared access signature or key, handed over unchanged.
    Secret { username: String, secret: String },

    /// Client certificate and key, PEM bytes.
    Certificate { cert_pem: Vec<u8>, key_pem: Vec<u8> },

    /// No credential beyond the device id.
    None,
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Secret { .. } => "shared access",
            Credential::Certificate { .. } => "x509 certificate",
            Credential::None => "none",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.kind())
    }
}

/// Resolved identity, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub host: String,
    pub credential: Credential,
}

impl DeviceIdentity {
    /// Resolves the credential named by `descriptor`.
    ///
    /// # Errors
    ///
    /// `Credential` when a PEM file cannot be read.
    pub fn resolve(
        descriptor: &ConnectionDescriptor,
        credentials_dir: &Path,
    ) -> Result<Self, IdentityError> {
        let credential = if descriptor.x509 {
            let cert_pem = read_credential(
                &credentials_dir.join(format!("{}-cert.pem", descriptor.device_id)),
            )?;
            let key_pem = read_credential(
                &credentials_dir.join(format!("{}-key.pem", descriptor.device_id)),
            )?;
            info!("Using X.509 client certificate authentication");
            Credential::Certificate { cert_pem, key_pem }
        } else if let Some(secret) = descriptor
            .shared_access_signature
            .as_ref()
            .or(descriptor.shared_access_key.as_ref())
        {
            Credential::Secret {
                username: format!(
                    "{}/{}/{}",
                    descriptor.host_name, descriptor.device_id, API_VERSION
                ),
                secret: secret.clone(),
            }
        } else {
            Credential::None
        };

        Ok(DeviceIdentity {
            device_id: descriptor.device_id.clone(),
            host: descriptor.connect_host().to_string(),
            credential,
        })
    }

    /// Parses `descriptor` and resolves it against `credentials_dir`.
    pub fn from_descriptor(descriptor: &str, credentials_dir: &Path) -> Result<Self, IdentityError> {
        Self::resolve(&ConnectionDescriptor::parse(descriptor)?, credentials_dir)
    }

    /// Applies host, client id and credential to the transport configuration.
    #[cfg(feature = "sensorbee-mqtt")]
    pub fn apply_to(&self, transport: &mut sensorbee_mqtt::Config) {
        use sensorbee_mqtt::{ClientAuth, ClientIdentity};

        let auth = match &self.credential {
            Credential::Secret { username, secret } => ClientAuth::Password {
                username: username.clone(),
                password: secret.clone(),
            },
            Credential::Certificate { cert_pem, key_pem } => ClientAuth::Certificate {
                cert_pem: cert_pem.clone(),
                key_pem: key_pem.clone(),
            },
            Credential::None => ClientAuth::Anonymous,
        };

        transport.apply_identity(
            self.host.clone(),
            ClientIdentity {
                device_id: self.device_id.clone(),
                auth,
            },
        );
    }
}

fn read_credential(path: &Path) -> Result<Vec<u8>, IdentityError> {
    std::fs::read(path).map_err(|source| IdentityError::Credential {
        path: path.to_path_buf(),
        source,
    })
}

/// Descriptor from the first argument, else from [`CONNECTION_STRING_ENV`].
pub fn descriptor_from_env(mut args: impl Iterator<Item = String>) -> Option<String> {
    args.next()
        .or_else(|| std::env::var(CONNECTION_STRING_ENV).ok())
        .filter(|d| !d.trim().is_empty())
}

/// [`CREDENTIALS_DIR_ENV`], else the current directory.
pub fn credentials_dir() -> PathBuf {
    std::env::var_os(CREDENTIALS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
