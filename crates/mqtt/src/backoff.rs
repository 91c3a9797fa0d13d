//! Exponential backoff for reconnecting after an established connection drops.
//!
//! ```text
//! delay[n] = min(initial * multiplier^(n-1), max_delay)
//! ```
//!
//! Backoff only applies once the broker has accepted the session at least
//! once. A failure of the very first connection attempt is reported to the
//! caller instead of being retried.

use std::time::Duration;

use thiserror::Error;

use super::config::Config;

/// Error type for backoff exhaustion.
#[derive(Debug, Error)]
pub enum BackoffError {
    /// Maximum retry attempts exceeded with the given limit.
    #[error("Maximum number of attempts exceeded: {0}")]
    MaxAttemptLimitError(u32),
}

/// Exponential backoff controller.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    attempt: u32,
    /// `None` retries forever.
    max_attempts: Option<u32>,
}

impl Backoff {
    /// Creates a backoff with explicit timing parameters.
    ///
    /// A multiplier below 1.0 is clamped to 1.0 (constant delay).
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay: initial,
            current_delay: initial,
            max_delay: max.max(initial),
            multiplier: multiplier.max(1.0),
            attempt: 0,
            max_attempts: None,
        }
    }

    /// Builds the backoff described by the transport configuration.
    pub fn from_config(config: &Config) -> Self {
        let backoff = Self::new(
            Duration::from_secs(config.reconnect_delay),
            Duration::from_secs(config.reconnect_max_delay),
            config.reconnect_backoff_multiplier,
        );
        match config.max_reconnect_attempts {
            0 => backoff,
            limit => backoff.with_max_attempts(limit),
        }
    }

    /// Caps the number of retries.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Returns the delay before the next attempt and advances the schedule.
    ///
    /// # Errors
    ///
    /// `BackoffError::MaxAttemptLimitError` once the attempt cap is reached.
    pub fn next_sleep(&mut self) -> Result<Duration, BackoffError> {
        if let Some(limit) = self.max_attempts {
            if self.attempt >= limit {
                return Err(BackoffError::MaxAttemptLimitError(limit));
            }
        }

        let delay = self.current_delay;
        self.attempt += 1;
        self.current_delay = self.current_delay.mul_f64(self.multiplier).min(self.max_delay);
        Ok(delay)
    }

    /// Restarts the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_delay = self.initial_delay;
    }

    /// Number of attempts handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    /// 1 second initial, doubling, capped at 60 seconds, unlimited attempts.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 2.0)
    }
}
