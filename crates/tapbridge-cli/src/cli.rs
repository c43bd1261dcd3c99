//! Command line flags.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{BackendConfig, Config, InputMode, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "tapbridge", version, about = "Serial RFID scanner to MQTT bridge")]
pub struct Cli {
    /// Path to a TOML configuration file. File settings are the base; flags
    /// and environment variables override them.
    #[arg(long, short, env = "TAPBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Team namespace (topics live under rfid/<team_id>/).
    #[arg(long, env = "TAPBRIDGE_TEAM_ID")]
    pub team_id: Option<String>,

    /// MQTT broker host.
    #[arg(long, env = "TAPBRIDGE_BROKER_HOST")]
    pub broker_host: Option<String>,

    /// MQTT broker port.
    #[arg(long, env = "TAPBRIDGE_BROKER_PORT")]
    pub broker_port: Option<u16>,

    /// MQTT client id.
    #[arg(long, env = "TAPBRIDGE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Log every message of the team namespace at debug level.
    #[arg(long, env = "TAPBRIDGE_SNIFF")]
    pub sniff: bool,

    /// Where scanner lines come from.
    #[arg(long, value_enum, env = "TAPBRIDGE_INPUT")]
    pub input: Option<InputMode>,

    /// Serial port of the scanner (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, env = "TAPBRIDGE_SERIAL_PORT")]
    pub serial_port: Option<String>,

    /// Serial baud rate.
    #[arg(long, env = "TAPBRIDGE_BAUD_RATE")]
    pub baud_rate: Option<u32>,

    /// Capture file to replay. Implies --input replay.
    #[arg(long, env = "TAPBRIDGE_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Balance backend URL templates with a {uid} placeholder, tried in
    /// order (comma-separated). Replaces the configured list.
    #[arg(long = "backend", env = "TAPBRIDGE_BACKENDS", value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Log filter: "trace", "debug", "info", "warn", "error" or a full
    /// directive. RUST_LOG takes precedence.
    #[arg(long, env = "TAPBRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, env = "TAPBRIDGE_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(team_id) = &self.team_id {
            config.team_id = team_id.clone();
        }
        if let Some(host) = &self.broker_host {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.broker_port {
            config.broker.port = port;
        }
        if let Some(client_id) = &self.client_id {
            config.broker.client_id = Some(client_id.clone());
        }
        if self.sniff {
            config.broker.sniff = true;
        }

        if let Some(mode) = self.input {
            config.input.mode = mode;
        }
        if let Some(port) = &self.serial_port {
            config.input.serial_port = Some(port.clone());
        }
        if let Some(baud_rate) = self.baud_rate {
            config.input.baud_rate = baud_rate;
        }
        if let Some(path) = &self.replay {
            config.input.mode = InputMode::Replay;
            config.input.replay_path = Some(path.clone());
        }

        if !self.backends.is_empty() {
            config.balance.backends = self
                .backends
                .iter()
                .enumerate()
                .map(|(i, url)| BackendConfig {
                    name: format!("backend{i}"),
                    url: url.clone(),
                    timeout_ms: tapbridge_core::constants::DEFAULT_LOOKUP_TIMEOUT_MS,
                })
                .collect();
        }

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}
