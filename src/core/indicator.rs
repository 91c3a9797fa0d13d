//! Visual feedback after a successful publish.
//!
//! A pulse switches the indicator on, waits, and switches it off again on
//! its own task. Overlapping pulses are independent: the first one to
//! finish switches the indicator off even if a later one is still running.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::indicator::{IndicatorBackend, IndicatorConfig};

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to export GPIO {pin}")]
    Export {
        pin: u32,
        #[source]
        source: io::Error,
    },
}

#[async_trait::async_trait]
pub trait Indicator: Send + Sync {
    async fn activate(&self) -> Result<(), IndicatorError>;
    async fn deactivate(&self) -> Result<(), IndicatorError>;
}

/// Activates `indicator` now and deactivates it after `duration`.
///
/// Returns immediately. Errors are logged by the pulse task.
pub fn pulse(indicator: Arc<dyn Indicator>, duration: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = indicator.activate().await {
            warn!("Indicator activation failed: {}", e);
        }
        tokio::time::sleep(duration).await;
        if let Err(e) = indicator.deactivate().await {
            warn!("Indicator deactivation failed: {}", e);
        }
    })
}

/// Builds the indicator selected by `[indicator]`.
pub fn from_config(config: &IndicatorConfig) -> Arc<dyn Indicator> {
    match config.backend {
        IndicatorBackend::Gpio => {
            info!("Indicator on GPIO {}", config.gpio_pin);
            Arc::new(GpioIndicator::new(&config.gpio_root, config.gpio_pin))
        }
        IndicatorBackend::Log => {
            info!("Indicator pulses are logged only");
            Arc::new(LogIndicator)
        }
    }
}

/// LED on a sysfs GPIO line.
///
/// ```text
/// /sys/class/gpio/export        <- "13" when gpio13/ is missing
/// /sys/class/gpio/gpio13/direction  <- "out"
/// /sys/class/gpio/gpio13/value      <- "1" / "0"
/// ```
#[derive(Debug)]
pub struct GpioIndicator {
    root: PathBuf,
    pin: u32,
    configured: AtomicBool,
}

impl GpioIndicator {
    pub fn new(root: &Path, pin: u32) -> Self {
        GpioIndicator {
            root: root.to_path_buf(),
            pin,
            configured: AtomicBool::new(false),
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn configure(&self) -> Result<(), IndicatorError> {
        if self.configured.load(Ordering::Acquire) {
            return Ok(());
        }

        if !self.pin_dir().exists() {
            debug!("Exporting GPIO {}", self.pin);
            fs::write(self.root.join("export"), self.pin.to_string()).map_err(|source| {
                IndicatorError::Export {
                    pin: self.pin,
                    source,
                }
            })?;
        }
        write_attr(&self.pin_dir().join("direction"), "out")?;

        self.configured.store(true, Ordering::Release);
        Ok(())
    }

    fn set(&self, on: bool) -> Result<(), IndicatorError> {
        self.configure()?;
        write_attr(&self.pin_dir().join("value"), if on { "1" } else { "0" })
    }
}

#[async_trait::async_trait]
impl Indicator for GpioIndicator {
    async fn activate(&self) -> Result<(), IndicatorError> {
        self.set(true)
    }

    async fn deactivate(&self) -> Result<(), IndicatorError> {
        self.set(false)
    }
}

fn write_attr(path: &Path, value: &str) -> Result<(), IndicatorError> {
    fs::write(path, value).map_err(|source| IndicatorError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Indicator for hosts without an LED.
#[derive(Debug, Default)]
pub struct LogIndicator;

#[async_trait::async_trait]
impl Indicator for LogIndicator {
    async fn activate(&self) -> Result<(), IndicatorError> {
        debug!("Indicator on");
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), IndicatorError> {
        debug!("Indicator off");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(bool, Instant)>>,
    }

    impl Recorder {
        fn states(&self) -> Vec<bool> {
            self.events.lock().unwrap().iter().map(|(on, _)| *on).collect()
        }
    }

    #[async_trait::async_trait]
    impl Indicator for Recorder {
        async fn activate(&self) -> Result<(), IndicatorError> {
            self.events.lock().unwrap().push((true, Instant::now()));
            Ok(())
        }

        async fn deactivate(&self) -> Result<(), IndicatorError> {
            self.events.lock().unwrap().push((false, Instant::now()));
            Ok(())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl Indicator for Broken {
        async fn activate(&self) -> Result<(), IndicatorError> {
            Err(IndicatorError::Export {
                pin: 13,
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        }

        async fn deactivate(&self) -> Result<(), IndicatorError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_on_then_off_after_duration() {
        let recorder = Arc::new(Recorder::default());
        let start = Instant::now();

        pulse(recorder.clone(), Duration::from_millis(100))
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert!(events[0].0);
        assert_eq!(events[0].1 - start, Duration::ZERO);
        assert!(!events[1].0);
        assert_eq!(events[1].1 - start, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_pulses_are_independent() {
        let recorder = Arc::new(Recorder::default());

        let first = pulse(recorder.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = pulse(recorder.clone(), Duration::from_millis(100));
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(recorder.states(), vec![true, true, false, false]);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_pulse_logs_failures() {
        pulse(Arc::new(Broken), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(logs_contain("Indicator activation failed"));
    }

    #[tokio::test]
    async fn test_gpio_writes_direction_and_value() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("gpio13")).unwrap();
        let led = GpioIndicator::new(root.path(), 13);

        led.activate().await.unwrap();
        let pin = root.path().join("gpio13");
        assert_eq!(fs::read_to_string(pin.join("direction")).unwrap(), "out");
        assert_eq!(fs::read_to_string(pin.join("value")).unwrap(), "1");

        led.deactivate().await.unwrap();
        assert_eq!(fs::read_to_string(pin.join("value")).unwrap(), "0");
        assert!(!root.path().join("export").exists());
    }

    #[tokio::test]
    async fn test_gpio_exports_missing_pin() {
        let root = TempDir::new().unwrap();
        let led = GpioIndicator::new(root.path(), 13);

        // Without a kernel behind sysfs the pin directory never appears.
        let result = led.activate().await;
        assert_eq!(
            fs::read_to_string(root.path().join("export")).unwrap(),
            "13"
        );
        assert!(matches!(result, Err(IndicatorError::Write { .. })));
    }

    #[tokio::test]
    async fn test_gpio_export_failure() {
        let root = TempDir::new().unwrap();
        let led = GpioIndicator::new(&root.path().join("missing"), 13);
        assert!(matches!(
            led.activate().await,
            Err(IndicatorError::Export { pin: 13, .. })
        ));
    }

    #[tokio::test]
    async fn test_from_config_log_backend() {
        let config = IndicatorConfig {
            backend: IndicatorBackend::Log,
            gpio_root: PathBuf::from("/nonexistent"),
            ..Default::default()
        };
        let indicator = from_config(&config);
        indicator.activate().await.unwrap();
        indicator.deactivate().await.unwrap();
    }
}
