use std::{
    env, process,
    sync::{Arc, OnceLock},
};

use sensorbee::{
    config::Config,
    core::{
        collector::Collector,
        indicator,
        sensors::SampleSource,
        session::{PublishSession, SessionOutcome},
    },
    identity::{self, DeviceIdentity, CONNECTION_STRING_ENV},
    logger::LoggerManager,
    print_error,
};
use tracing::{debug, error, info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = config();
    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting sensorbee version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);

    let descriptor = identity::descriptor_from_env(env::args().skip(1)).unwrap_or_else(|| {
        error!(
            "Missing connection string: pass it as the first argument or set {}",
            CONNECTION_STRING_ENV
        );
        process::exit(1);
    });
    let device = DeviceIdentity::from_descriptor(&descriptor, &identity::credentials_dir())
        .unwrap_or_else(|e| {
            error!("Invalid device identity: {}", e);
            process::exit(1);
        });
    info!(
        "Device '{}' on {} ({} credential)",
        device.device_id,
        device.host,
        device.credential.kind()
    );

    let topic = cfg.session.topic_for(&device.device_id);
    let collector: Arc<dyn Collector> = {
        #[cfg(feature = "sensorbee-mqtt")]
        {
            use sensorbee::core::{collector::MqttCollector, lifecycle};

            let mut transport = cfg.transport.clone();
            device.apply_to(&mut transport);
            debug!("{:#?}", transport);

            let manager = sensorbee_mqtt::MqttManager::from_config(transport).unwrap_or_else(|e| {
                error!("Failed to create MqttManager: {}", e);
                process::exit(1);
            });
            let instance = manager.build_and_start().await.unwrap_or_else(|e| {
                error!("Failed to build and start MQTT kernel: {}", e);
                process::exit(1);
            });
            lifecycle::watch_transport(instance.state_receiver());

            info!("Publishing to '{}' with QoS {}", topic, cfg.session.qos);
            Arc::new(MqttCollector::new(
                Arc::new(instance),
                topic,
                cfg.session.qos,
            ))
        }

        #[cfg(not(feature = "sensorbee-mqtt"))]
        {
            info!("Running without MQTT, '{}' is not used", topic);
            Arc::new(sensorbee::core::collector::LogCollector)
        }
    };

    let indicator = indicator::from_config(&cfg.indicator);
    let source = SampleSource::from_config(&cfg.sensors);
    let mut session = PublishSession::new(
        device.device_id.clone(),
        cfg.session.clone(),
        collector.clone(),
        indicator.clone(),
        source,
    );

    info!(
        "Session: {} messages every {:?}",
        cfg.session.message_limit,
        cfg.session.pacing_interval()
    );

    tokio::select! {
        report = session.run() => {
            match report.outcome {
                SessionOutcome::Completed => info!("Session complete"),
                SessionOutcome::ConnectFailed(e) => warn!("Session ended without connecting: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            if let Err(e) = indicator.deactivate().await {
                debug!("Indicator left on: {}", e);
            }
            collector.close().await;
            info!("Shutdown complete");
        }
    }
}
