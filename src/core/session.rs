//! The bounded publish session.
//!
//! ```text
//! Idle -> Connecting -> Running -> Draining -> Terminated
//!              \________________________________/
//!                     connect failure
//! ```
//!
//! One cycle is: increment the sequence number, sample the sensors, build
//! the message, publish it, and pulse the indicator if the publish
//! succeeded. The next cycle starts `pacing_interval` after the previous
//! outcome, so cycles never overlap. After `message_limit` attempts the
//! session waits out the grace period, closes the collector and ends.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info};

use super::{
    collector::{Collector, ConnectError, PublishError},
    indicator::{self, Indicator},
    lifecycle::{ConnectionState, SessionLifecycle, SessionPhase},
    message::MessageBuilder,
    sensors::SampleSource,
};
use crate::config::session::SessionConfig;

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// All attempts were made and the grace period elapsed.
    Completed,
    /// The collector could not be connected; nothing was published.
    ConnectFailed(ConnectError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    pub sequence: u64,
    pub outcome: Result<(), PublishError>,
    pub pulsed: bool,
}

/// Summary returned by [`PublishSession::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub cycles: Vec<CycleRecord>,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    fn new() -> Self {
        SessionReport {
            attempts: 0,
            successes: 0,
            failures: 0,
            cycles: Vec::new(),
            outcome: SessionOutcome::Completed,
        }
    }

    fn record(&mut self, record: CycleRecord) {
        self.attempts += 1;
        if record.outcome.is_ok() {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.cycles.push(record);
    }
}

pub struct PublishSession {
    device_id: String,
    config: SessionConfig,
    collector: Arc<dyn Collector>,
    indicator: Arc<dyn Indicator>,
    source: SampleSource,
    lifecycle: SessionLifecycle,
    sequence: u64,
    connection: ConnectionState,
}

impl PublishSession {
    pub fn new(
        device_id: impl Into<String>,
        config: SessionConfig,
        collector: Arc<dyn Collector>,
        indicator: Arc<dyn Indicator>,
        source: SampleSource,
    ) -> Self {
        PublishSession {
            device_id: device_id.into(),
            config,
            collector,
            indicator,
            source,
            lifecycle: SessionLifecycle::new(),
            sequence: 0,
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// Runs the session to the end.
    ///
    /// Connect and publish failures are logged and recorded in the report;
    /// they never abort the run early except for the connect step.
    pub async fn run(&mut self) -> SessionReport {
        let mut report = SessionReport::new();

        self.lifecycle.set_phase(SessionPhase::Connecting);
        self.set_connection(ConnectionState::Connecting);

        if let Err(e) = self.collector.connect().await {
            error!("Could not connect: {}", e);
            self.collector.close().await;
            self.set_connection(ConnectionState::Terminated);
            self.lifecycle.set_phase(SessionPhase::Terminated);
            report.outcome = SessionOutcome::ConnectFailed(e);
            return report;
        }

        info!("Client connected");
        self.set_connection(ConnectionState::Connected);
        self.lifecycle.set_phase(SessionPhase::Running);

        sleep(self.config.settling_delay()).await;

        while self.sequence < self.config.message_limit {
            let record = self.cycle().await;
            report.record(record);

            if self.sequence < self.config.message_limit {
                sleep(self.config.pacing_interval()).await;
            }
        }

        self.lifecycle.set_phase(SessionPhase::Draining);
        debug!(
            "Waiting {:?} before closing the session",
            self.config.grace_period()
        );
        sleep(self.config.grace_period()).await;

        self.collector.close().await;
        self.set_connection(ConnectionState::Disconnected);
        self.set_connection(ConnectionState::Terminated);
        self.lifecycle.set_phase(SessionPhase::Terminated);

        info!(
            "Session finished: {} attempts, {} delivered, {} failed",
            report.attempts, report.successes, report.failures
        );
        report
    }

    async fn cycle(&mut self) -> CycleRecord {
        self.sequence += 1;
        let sequence = self.sequence;

        let reading = self.source.sample();
        let message = MessageBuilder::build(&self.device_id, sequence, &reading);

        let payload = message
            .to_json()
            .unwrap_or_else(|e| format!("<unserializable: {e}>"));
        info!("Sending message #{}: {}", sequence, payload);

        let outcome = self.collector.publish(&message).await;
        let pulsed = match &outcome {
            Ok(()) => {
                debug!("Message #{} delivered", sequence);
                indicator::pulse(self.indicator.clone(), self.config.pulse_duration());
                true
            }
            Err(e) => {
                error!("Message error: {}", e);
                false
            }
        };

        CycleRecord {
            sequence,
            outcome,
            pulsed,
        }
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            debug!("Connection state: {} -> {}", self.connection, state);
            self.connection = state;
        }
    }
}
