//! procwatch - Host and Process Resource Monitor
//!
//! Samples CPU, memory and disk activity every interval, appends a snapshot
//! of the busiest process trees to a rotating log, and emails an alert when
//! a threshold stays exceeded.

use anyhow::Result;
use clap::Parser;
use procwatch::{app::App, cli::Cli, config::Config, internal_metrics};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let (config, notices) = match Config::load(&cli) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Values replaced by defaults are reported once the subscriber is up.
    for notice in &notices {
        warn!("Configuration: {}", notice);
    }
    if let Err(err) = config.validate() {
        eprintln!("Invalid configuration: {}", err);
        std::process::exit(1);
    }

    info!("procwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("CPU Threshold: {}%", config.monitor.cpu_threshold);
    info!("RAM Threshold: {}%", config.monitor.ram_threshold);
    info!("Disk Threshold: {}%", config.monitor.disk_threshold);
    info!("Interval: {}ms", config.monitor.interval_ms);
    info!("Log File: {}", config.log.path.display());
    info!("Log Rotation: {:?}", config.log.rotation);
    info!("Display Mode: {}", config.display.mode.as_str());
    info!(
        "Email Alerts: {}",
        if config.email.is_active() {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    if config.email.is_active() {
        info!("Email Recipients: {}", config.email.recipients.join(", "));
        info!("Alert Duration: {}s", config.email.alert_duration_seconds);
        info!("Cooldown: {} minutes", config.email.cooldown_minutes);
    }
    info!("Log Metrics: {}", config.metrics.log_metrics);
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_task = match internal_metrics::install(&config.metrics, shutdown_rx.clone()) {
        Ok(task) => task,
        Err(e) => {
            warn!("Metrics logging disabled: {:#}", e);
            None
        }
    };

    let test_email = cli.test_email;
    let app = App::builder(config).build(shutdown_rx).await?;

    if test_email {
        match app.send_test_email().await {
            Ok(()) => info!("Test email queued."),
            Err(e) => warn!("Test email not sent: {:#}", e),
        }
    }

    info!("procwatch initialized successfully. Press Ctrl+C to stop.");

    let signal_task = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    signal_task.abort();

    if let Some(handle) = metrics_task {
        if let Err(e) = handle.await {
            error!("Metrics task panicked: {:?}", e);
        }
    }

    info!("All tasks shut down. Exiting.");
    Ok(())
}
