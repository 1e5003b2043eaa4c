//! Wires the CLI, config, broker core (or external adapter), and
//! scheduler together into one runnable process.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::broker::Broker;
use crate::cli::Cli;
use crate::config::{Config, MqttType};
use crate::error::Error;
use crate::external_broker::ExternalPublisher;
use crate::scheduler::Scheduler;

pub fn main(cli: &Cli) -> Result<(), Error> {
    init_log(cli.verbose);

    if let Some(path) = &cli.generate_config {
        let yaml = serde_yaml::to_string(&Config::default())?;
        std::fs::write(path, yaml)?;
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;
    config.apply_env_overrides();
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;

    if cli.test {
        return runtime.block_on(run_test(config));
    }

    match config.mqtt.kind {
        MqttType::Builtin => runtime.block_on(run_builtin(config)),
        MqttType::External => runtime.block_on(run_external(config)),
    }
}

fn load_config(path: &std::path::Path) -> Result<Config, Error> {
    if !path.exists() {
        log::warn!("config file {} not found, using defaults", path.display());
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    Config::from_yaml(&text)
}

fn init_log(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn run_test(config: Config) -> Result<(), Error> {
    let mut scheduler = Scheduler::new(config);
    let document = scheduler.collect_once().await;
    println!("{}", serde_json::to_string_pretty(&document).map_err(|err| {
        Error::from_string(crate::error::ErrorKind::Fatal, format!("serializing document: {err}"))
    })?);
    Ok(())
}

async fn run_builtin(config: Config) -> Result<(), Error> {
    let bind_addr = format!("{}:{}", config.mqtt.host, config.mqtt.port);
    let (scheduler_tx, scheduler_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let broker = Arc::new(Broker::new());
    let broker_handle = tokio::spawn(broker.run(bind_addr, scheduler_rx, shutdown_rx));

    let mut scheduler = Scheduler::new(config);
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_tx).await });

    tokio::signal::ctrl_c().await.ok();
    log::info!("received shutdown signal");
    let _ = shutdown_tx.send(true);
    scheduler_handle.abort();

    broker_handle.await.map_err(|err| Error::from_string(crate::error::ErrorKind::Fatal, format!("broker task panicked: {err}")))?
}

async fn run_external(config: Config) -> Result<(), Error> {
    let (scheduler_tx, scheduler_rx) = mpsc::channel(8);
    let (publisher, event_loop) = ExternalPublisher::connect(&config);

    let mut scheduler = Scheduler::new(config);
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_tx).await });
    let drive_handle = tokio::spawn(ExternalPublisher::drive(event_loop));

    tokio::select! {
        () = publisher.run(scheduler_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("received shutdown signal");
        }
    }

    scheduler_handle.abort();
    drive_handle.abort();
    Ok(())
}
