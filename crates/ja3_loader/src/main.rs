use ja3_loader::telemetry::init_telemetry;
use ja3_loader::{Ja3Loader, ServiceConfig};
use ja3_nats::NatsClient;
use ja3_runner::{Runner, EXIT_FAILURE};
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    if let Err(e) = init_telemetry(&config.telemetry_config()) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(EXIT_FAILURE);
    }

    info!("Starting JA3 loader");
    info!("Configuration: {:?}", config);

    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    info!(url = %config.nats_url, "Creating NATS connection");
    let nats_client = match NatsClient::connect(&config.nats_url, startup_timeout).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to connect to NATS");
            std::process::exit(EXIT_FAILURE);
        }
    };

    if let Err(e) = nats_client.ensure_stream(&config.input_stream).await {
        error!(error = format!("{e:#}"), "Failed to ensure input stream exists");
        std::process::exit(EXIT_FAILURE);
    }

    let loader = match Ja3Loader::new(&config, &nats_client).await {
        Ok(loader) => loader,
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to initialize JA3 loader");
            std::process::exit(EXIT_FAILURE);
        }
    };

    info!("Initialised, start consuming");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let runner = loader
        .into_runner_processes()
        .into_iter()
        .fold(Runner::new(), |runner, (name, process)| {
            runner.with_named_process(name, process)
        })
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            nats_client.close().await?;
            info!("Cleanup complete");
            Ok::<(), anyhow::Error>(())
        })
        .with_shutdown_timeout(shutdown_timeout)
        .with_closer_timeout(shutdown_timeout);

    std::process::exit(runner.run().await);
}
