//! # sensorbee-mqtt
//!
//! MQTT transport for the sensorbee telemetry agent, built on `rumqttc`.
//!
//! - One connection per device, authenticated by the device identity
//!   (SAS-style username/password or an X.509 client certificate held in memory)
//! - The first connection attempt is reported to the caller, never retried
//! - Established connections reconnect with exponential backoff
//! - Publishes are JSON; QoS 1 and 2 resolve on broker acknowledgement
//! - Shutdown waits for in-flight publishes before sending DISCONNECT
//!
//! ```ignore
//! use std::sync::Arc;
//! use sensorbee_mqtt::{Config, MqttManager, Publisher};
//!
//! let instance = MqttManager::from_config(Config::default())?
//!     .build_and_start()
//!     .await?;
//! instance.wait_connected().await?;
//!
//! let instance = Arc::new(instance);
//! Publisher::new(Arc::clone(&instance))
//!     .publish(&reading, "devices/dev1/messages/events/", 1)
//!     .await?;
//! instance.shutdown().await?;
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod publisher;
pub mod state;

#[cfg(test)]
mod test_broker;

pub use backoff::{Backoff, BackoffError};
pub use client::ClientBuilder;
pub use config::{ClientAuth, ClientIdentity, Config, TlsConfig};
pub use connection::ConnectionKernel;
pub use error::TransferError;
pub use manager::{MqttInstance, MqttManager, PublishDrain, PublishGuard};
pub use publisher::{qos_from_u8, Publisher};
pub use state::ConnectionState;

pub type Result<T> = std::result::Result<T, TransferError>;
