//! Bridge configuration with TOML file support.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file given
//! with `--config`, then CLI flags and `TAPBRIDGE_*` environment variables
//! (see [`crate::cli::Cli::apply`]). Every section and key is optional in
//! the file:
//!
//! ```toml
//! team_id = "team_a"
//!
//! [broker]
//! host = "broker.local"
//! port = 1883
//!
//! [input]
//! mode = "serial"
//! serial_port = "/dev/ttyUSB0"
//!
//! [[balance.backends]]
//! name = "cloud"
//! url = "http://backend.example:9249/card/{uid}"
//! timeout_ms = 2000
//! ```
//!
//! The configuration is read once at startup. [`Config::validate`] must pass
//! before anything is started.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tapbridge_core::{
    Error, Result,
    constants::{
        DEFAULT_BALANCE, DEFAULT_BAUD_RATE, DEFAULT_BROKER_PORT, DEFAULT_DEBOUNCE_MS,
        DEFAULT_DIAGNOSTIC_KEYWORDS, DEFAULT_HEALTH_INTERVAL_SECS, DEFAULT_IDLE_DELAY_MS,
        DEFAULT_KEEP_ALIVE_SECS, DEFAULT_LOOKUP_TIMEOUT_MS, DEFAULT_PRESENCE_TIMEOUT_MS,
        DEFAULT_SERIAL_POLL_MS,
    },
    validate_balance,
};
use tapbridge_engine::{BridgeSettings, HealthConfig};
use tapbridge_network::{HttpLookup, MqttConfig};
use tapbridge_protocol::{FrameExtractor, Topics};
use tracing_subscriber::EnvFilter;

/// Where scanner lines come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Scanner on a serial port.
    #[default]
    Serial,
    /// UIDs typed on standard input.
    Stdin,
    /// Replay of a captured serial log.
    Replay,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines for a terminal.
    #[default]
    Human,
    /// Newline-delimited JSON for log aggregation.
    Json,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Team namespace: topics live under `rfid/{team_id}/`.
    pub team_id: String,
    pub broker: BrokerConfig,
    pub input: InputConfig,
    pub timing: TimingConfig,
    pub balance: BalanceConfig,
    pub extractor: ExtractorConfig,
    pub health: HealthSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Defaults to `tapbridge-<unix seconds>`.
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    /// Subscribe to the whole team namespace and log every message.
    pub sniff: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub mode: InputMode,
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub poll_timeout_ms: u64,
    pub replay_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub health_interval_secs: u64,
    pub presence_timeout_ms: u64,
    pub debounce_ms: u64,
    pub idle_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BalanceConfig {
    /// Balance for a card unknown to every backend and to the cache.
    pub default_balance: f64,
    /// Tried in order; the first success wins.
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub name: String,
    /// URL template with a `{uid}` placeholder.
    pub url: String,
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Case-insensitive substrings marking firmware log lines. Empty
    /// disables the filter.
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthSection {
    pub ssid: Option<String>,
    pub rssi: i32,
    pub free_heap: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` overrides it.
    pub level: String,
    pub format: LogFormat,
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id: None,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            sniff: false,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: InputMode::Serial,
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_timeout_ms: DEFAULT_SERIAL_POLL_MS,
            replay_path: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
            presence_timeout_ms: DEFAULT_PRESENCE_TIMEOUT_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            idle_delay_ms: DEFAULT_IDLE_DELAY_MS,
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            default_balance: DEFAULT_BALANCE,
            backends: vec![BackendConfig {
                name: "local".to_string(),
                url: "http://localhost:8080/card/{uid}".to_string(),
                timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            }],
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_DIAGNOSTIC_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl Default for HealthSection {
    fn default() -> Self {
        let health = HealthConfig::default();
        Self {
            ssid: health.ssid,
            rssi: health.rssi,
            free_heap: health.free_heap,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl Config {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// `Error::Config` on syntax errors, unknown keys or wrong types.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Defaults, or the file at `path` when given.
    ///
    /// # Errors
    ///
    /// See [`from_toml_file`](Self::from_toml_file).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Check everything that would otherwise fail after startup.
    ///
    /// # Errors
    ///
    /// `Error::MissingConfig` for a required key that is absent,
    /// `Error::Config` for an invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.team_id.trim().is_empty() {
            return Err(Error::MissingConfig("team_id".into()));
        }
        self.topics()?;

        self.mqtt()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        match self.input.mode {
            InputMode::Serial if self.input.serial_port.is_none() => {
                return Err(Error::MissingConfig("input.serial_port".into()));
            }
            InputMode::Replay if self.input.replay_path.is_none() => {
                return Err(Error::MissingConfig("input.replay_path".into()));
            }
            _ => {}
        }
        if self.input.baud_rate == 0 {
            return Err(Error::Config("input.baud_rate must be non-zero".into()));
        }

        for (key, value) in [
            ("input.poll_timeout_ms", self.input.poll_timeout_ms),
            ("timing.health_interval_secs", self.timing.health_interval_secs),
            ("timing.presence_timeout_ms", self.timing.presence_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{key} must be non-zero")));
            }
        }

        validate_balance(self.balance.default_balance)
            .map_err(|e| Error::Config(format!("balance.default_balance: {e}")))?;
        self.lookups()?;

        EnvFilter::try_new(&self.logging.level)
            .map_err(|e| Error::Config(format!("logging.level: {e}")))?;

        Ok(())
    }

    pub fn topics(&self) -> Result<Topics> {
        Topics::new(&self.team_id)
    }

    pub fn mqtt(&self) -> MqttConfig {
        let mut mqtt = MqttConfig::new(&self.broker.host)
            .with_port(self.broker.port)
            .with_sniff(self.broker.sniff);
        if let Some(client_id) = &self.broker.client_id {
            mqtt = mqtt.with_client_id(client_id);
        }
        mqtt.keep_alive = Duration::from_secs(self.broker.keep_alive_secs);
        mqtt
    }

    /// Backend lookups, in configured order.
    ///
    /// # Errors
    ///
    /// `Error::Config` for a backend with an invalid URL or timeout.
    pub fn lookups(&self) -> Result<Vec<HttpLookup>> {
        self.balance
            .backends
            .iter()
            .map(|backend| {
                HttpLookup::new(
                    &backend.name,
                    &backend.url,
                    Duration::from_millis(backend.timeout_ms),
                )
            })
            .collect()
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            health_interval: Duration::from_secs(self.timing.health_interval_secs),
            presence_timeout: Duration::from_millis(self.timing.presence_timeout_ms),
            debounce: Duration::from_millis(self.timing.debounce_ms),
            idle_delay: Duration::from_millis(self.timing.idle_delay_ms),
            poll_timeout: Duration::from_millis(self.input.poll_timeout_ms),
        }
    }

    pub fn extractor(&self) -> FrameExtractor {
        FrameExtractor::new(&self.extractor.keywords)
    }

    pub fn health(&self) -> HealthConfig {
        HealthConfig {
            ssid: self.health.ssid.clone(),
            rssi: self.health.rssi,
            free_heap: self.health.free_heap,
            ..HealthConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_need_team_and_port() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::MissingConfig(key)) if key == "team_id"));

        let config = Config {
            team_id: "team_a".into(),
            ..Config::default()
        };
        assert!(
            matches!(
                config.validate(),
                Err(Error::MissingConfig(key)) if key == "input.serial_port"
            )
        );
    }

    #[test]
    fn test_stdin_mode_with_defaults_is_valid() {
        let mut config = Config {
            team_id: "team_a".into(),
            ..Config::default()
        };
        config.input.mode = InputMode::Stdin;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bridge_settings_mapping() {
        let settings = Config::default().bridge_settings();
        assert_eq!(settings, BridgeSettings::default());
    }
}
