use std::process;

use sensorbee::{
    config::Config,
    core::{
        probe::{Probe, ProbeSettings},
        sensors::SampleSource,
    },
    logger::LoggerManager,
    print_error,
};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = Config::new().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });
    LoggerManager::new(cfg.logger.clone())
        .and_then(|manager| manager.init())
        .unwrap_or_else(|e| {
            print_error!("Failed to init Log Manager: {}", e);
            process::exit(1);
        });

    let settings = ProbeSettings::from_env().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    info!("sensorbee-probe version {}", env!("CARGO_PKG_VERSION"));
    let probe = Probe::new(SampleSource::from_config(&cfg.sensors), settings);

    tokio::select! {
        _ = probe.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
}
