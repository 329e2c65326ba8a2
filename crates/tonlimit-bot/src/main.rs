//! tonlimit service - Entry Point
//!
//! Observation mode: triggers are evaluated and logged only
//! Trading mode: triggered orders are submitted to the wallet service

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// tonlimit conditional swap service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TONLIMIT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tonlimit_telemetry::init_logging(tonlimit_telemetry::DEFAULT_LOG_FILTER)?;

    info!("Starting tonlimit v{}", env!("CARGO_PKG_VERSION"));

    let config_path = tonlimit_bot::resolve_config_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = tonlimit_bot::AppConfig::from_file(&config_path)?;
    info!(mode = ?config.engine.mode, api_enabled = config.server.enabled, "Configuration loaded");

    let app = tonlimit_bot::Application::new(config).await?;
    let report = app.run().await?;

    info!(
        evaluate_ticks = report.evaluate_ticks,
        monitor_ticks = report.monitor_ticks,
        "Shutdown complete"
    );
    Ok(())
}
