//! sensorbee: device-side telemetry agent.
//!
//! Samples temperature, light and sound sensors on a fixed cadence, publishes
//! each reading as a JSON message over MQTT, and blinks an LED after every
//! delivered message. A session is bounded: after the configured number of
//! attempts it waits out a grace period and exits.
//!
//! ## Modules
//!
//! * `config` – TOML configuration with defaults and validation.
//! * `core` – the publish session and the sensor, message, collector and
//!   indicator pieces it drives, plus the diagnostic probe.
//! * `identity` – connection descriptor parsing and credential loading.
//! * `logger` – `tracing` subscriber setup (console and journald).
//!
//! ## Features
//!
//! * `sensorbee-mqtt` – MQTT transport via the `sensorbee_mqtt` crate
//!   (default: enabled). Without it messages are only logged.

pub mod config;
pub mod core;
pub mod identity;
pub mod logger;
