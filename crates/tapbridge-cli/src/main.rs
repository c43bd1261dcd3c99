//! tapbridge: serial RFID scanner to MQTT bridge.

use std::sync::Arc;

use clap::Parser;
use tapbridge_cli::{Cli, Config, ShutdownController, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    logging::init_logging(config.logging.format, &config.logging.level)?;
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "Loaded configuration");
    }

    let controller = Arc::new(ShutdownController::new());
    let shutdown = controller.signalled();
    tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.wait_for_signal().await }
    });

    tapbridge_cli::run(config, shutdown).await?;

    tracing::info!("tapbridge exited cleanly");
    Ok(())
}
