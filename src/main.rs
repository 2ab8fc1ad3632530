//! Notify Gateway - HTTP entry point
//!
//! Accepts alerts on `/notify/{backends}` and `/prometheus_notify/{backends}`
//! and delivers them through the drivers configured for each backend.

use anyhow::Result;
use clap::Parser;
use notify_gateway::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let (config, load_error) = Config::load_or_default(&cli);

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(err) = load_error {
        warn!(
            path = %Config::resolve_path(&cli).display(),
            error = %err,
            "Failed to load configuration, running without backends"
        );
    }

    info!("Notify Gateway starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}:{}", config.server.host, config.server.port);
    match config.dispatch.driver_timeout() {
        Some(timeout) => info!("Driver Timeout: {}s", timeout.as_secs()),
        None => info!("Driver Timeout: Disabled"),
    }
    info!(
        "Metrics: {}",
        if config.metrics.enabled { "Enabled" } else { "Disabled" }
    );
    for (backend, drivers) in &config.notify_backends {
        let names: Vec<&str> = drivers.keys().map(String::as_str).collect();
        info!("Backend '{}': {}", backend, names.join(", "));
    }
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = App::builder(config).build().await?;
    let server = tokio::spawn(app.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    if shutdown_tx.send(true).is_err() {
        warn!("HTTP server already stopped");
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server failed: {:?}", e),
        Err(e) => error!("HTTP server task panicked: {:?}", e),
    }

    info!("Exiting.");
    Ok(())
}
