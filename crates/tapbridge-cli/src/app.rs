//! Wiring: builds every component from a validated [`Config`] and runs the
//! bridge until shutdown.

use std::time::Duration;

use anyhow::Context;
use tapbridge_engine::{
    BalanceCache, BalanceResolver, BridgeLoop, HealthReporter, Publisher, ReconciliationHandler,
};
use tapbridge_hardware::{AnyLineSource, ReaderSource, SerialConfig, SerialSource};
use tracing::{info, warn};

use crate::config::{Config, InputConfig, InputMode};

/// Longest wait for the broker session to flush after the loop stops.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Open the configured line source.
///
/// # Errors
///
/// Fails if a required path is missing, the serial settings are invalid, or
/// the replay file cannot be opened. A serial port that does not exist yet
/// is not an error; the reader keeps retrying it.
pub async fn open_source(input: &InputConfig) -> anyhow::Result<AnyLineSource> {
    let source = match input.mode {
        InputMode::Serial => {
            let port = input
                .serial_port
                .as_deref()
                .context("input.serial_port is required in serial mode")?;
            let config = SerialConfig::new(port)
                .with_baud_rate(input.baud_rate)
                .with_read_timeout(Duration::from_millis(input.poll_timeout_ms));
            AnyLineSource::from(SerialSource::spawn(config)?)
        }
        InputMode::Stdin => AnyLineSource::from(ReaderSource::stdin()),
        InputMode::Replay => {
            let path = input
                .replay_path
                .as_deref()
                .context("input.replay_path is required in replay mode")?;
            AnyLineSource::from(ReaderSource::replay(path).await?)
        }
    };
    Ok(source)
}

/// Run the bridge until `shutdown` resolves.
///
/// On shutdown the loop announces `offline`, the broker connection is closed
/// and the inbound session gets [`SHUTDOWN_GRACE`] to flush.
///
/// # Errors
///
/// Only startup failures (invalid configuration, unusable input) are
/// returned. Runtime failures are logged and survived.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    config.validate()?;

    let topics = config.topics()?;
    let (transport, session) = tapbridge_network::connect(&config.mqtt(), &topics)?;

    let cache = BalanceCache::new();
    let publisher = Publisher::new(transport.clone(), topics);

    let handler = ReconciliationHandler::new(cache.clone(), publisher.clone());
    let inbound = tokio::spawn(session.run(handler));

    let resolver = BalanceResolver::new(config.lookups()?, cache)
        .with_default_balance(config.balance.default_balance);
    let source = open_source(&config.input).await?;

    info!(
        team = %config.team_id,
        broker = %format!("{}:{}", config.broker.host, config.broker.port),
        input = ?config.input.mode,
        backends = resolver.lookup_count(),
        "Starting bridge"
    );

    let mut bridge = BridgeLoop::new(source, resolver, publisher, config.bridge_settings())
        .with_extractor(config.extractor())
        .with_health(HealthReporter::new(config.health()));
    bridge.run(shutdown).await;

    if let Err(e) = transport.disconnect() {
        warn!(error = %e, "Broker disconnect failed");
    }
    match tokio::time::timeout(SHUTDOWN_GRACE, inbound).await {
        Ok(Ok(())) => info!("Broker session closed"),
        Ok(Err(e)) => warn!(error = %e, "Broker session task failed"),
        Err(_) => warn!(
            grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
            "Broker session did not close in time"
        ),
    }

    Ok(())
}
