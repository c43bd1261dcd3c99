//! Structured logging initialisation.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! level (e.g. `"info"`, `"debug,tapbridge_network=trace"`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Fails if `level` is not a valid filter directive or a global subscriber
/// is already installed.
pub fn init_logging(format: LogFormat, level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Human => registry.with(fmt::layer().with_target(true)).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()?,
    }
    Ok(())
}
