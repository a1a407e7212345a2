use anyhow::{Context, Result};
use clap::Parser;
use surge_config::{ConfigLoader, LogLevel, SurgeConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

mod cli;
mod commands;

use cli::Cli;

/// Load configuration from file, or from the environment without one
fn load_config(cli: &Cli) -> Result<SurgeConfig> {
    let mut config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .with_context(|| match &cli.config {
            Some(path) => format!("Failed to load configuration from {:?}", path),
            None => "Failed to load configuration from environment".to_string(),
        })?;

    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.parse::<LogLevel>().map_err(anyhow::Error::msg)?);
    }
    Ok(config)
}

/// Cancel `cancel` on the first Ctrl-C, exit on the second
async fn interrupt(cancel: CancellationToken) {
    if signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupted, press Ctrl-C again to exit immediately");
    cancel.cancel();

    if signal::ctrl_c().await.is_ok() {
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    surge_logging::init_logging_from_config(&config.logging)?;
    debug!("Target server is {}", config.session.addr());

    let cancel = CancellationToken::new();
    tokio::spawn(interrupt(cancel.clone()));

    commands::run(cli.command, &config.session, &cancel).await
}
