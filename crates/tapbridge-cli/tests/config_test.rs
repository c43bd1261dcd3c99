//! Configuration loading, precedence and validation.

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use rstest::rstest;
use tapbridge_cli::{
    Cli, Config,
    config::{InputMode, LogFormat},
};
use tapbridge_core::Error;

const FULL: &str = r#"
team_id = "team_a"

[broker]
host = "broker.local"
port = 1884
client_id = "bridge-1"
keep_alive_secs = 30
sniff = true

[input]
mode = "serial"
serial_port = "/dev/ttyUSB0"
baud_rate = 9600
poll_timeout_ms = 50

[timing]
health_interval_secs = 30
presence_timeout_ms = 1500
debounce_ms = 250
idle_delay_ms = 20

[balance]
default_balance = 25.0

[[balance.backends]]
name = "cloud"
url = "http://backend.example:9249/card/{uid}"
timeout_ms = 1000

[[balance.backends]]
name = "local"
url = "http://localhost:8080/card/{uid}"

[extractor]
keywords = ["boot", "wifi"]

[health]
ssid = "venue-net"
rssi = -61

[logging]
level = "debug"
format = "json"
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("tapbridge").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_full_file() {
    let file = write_config(FULL);
    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.team_id, "team_a");
    assert_eq!(config.broker.port, 1884);
    assert!(config.broker.sniff);
    assert_eq!(config.input.baud_rate, 9600);
    assert_eq!(config.balance.backends.len(), 2);
    assert_eq!(config.balance.backends[1].timeout_ms, 2000);
    assert_eq!(config.extractor.keywords, vec!["boot", "wifi"]);
    assert_eq!(config.health.free_heap, 40_000);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.validate().is_ok());

    let settings = config.bridge_settings();
    assert_eq!(settings.presence_timeout, Duration::from_millis(1500));
    assert_eq!(settings.poll_timeout, Duration::from_millis(50));

    let mqtt = config.mqtt();
    assert_eq!(mqtt.client_id, "bridge-1");
    assert_eq!(mqtt.keep_alive, Duration::from_secs(30));

    let lookups = config.lookups().unwrap();
    assert_eq!(lookups.len(), 2);
    assert_eq!(
        lookups[0].url_for(&tapbridge_core::Uid::new("a1b2c3d4").unwrap()),
        "http://backend.example:9249/card/A1B2C3D4"
    );
}

#[test]
fn test_partial_file_keeps_defaults() {
    let config = Config::from_toml_str("team_id = \"team_b\"\n[input]\nmode = \"stdin\"\n").unwrap();

    assert_eq!(config.broker.host, "localhost");
    assert_eq!(config.broker.port, 1883);
    assert_eq!(config.input.mode, InputMode::Stdin);
    assert_eq!(config.balance.default_balance, 50.0);
    assert_eq!(config.timing.presence_timeout_ms, 2000);
    assert!(config.extractor.keywords.contains(&"wifi".to_string()));
    assert!(config.validate().is_ok());
}

#[rstest]
#[case::unknown_key("team_id = \"a\"\nbogus = 1\n")]
#[case::unknown_section_key("[broker]\nhostname = \"x\"\n")]
#[case::wrong_type("[broker]\nport = \"1883\"\n")]
#[case::bad_mode("[input]\nmode = \"usb\"\n")]
fn test_rejected_documents(#[case] contents: &str) {
    let err = Config::from_toml_str(contents).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_missing_file() {
    let err = Config::load(Some(Path::new("/nonexistent/tapbridge.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[rstest]
#[case::reserved_team("team_id = \"a/b\"\n[input]\nmode = \"stdin\"\n")]
#[case::zero_port("team_id = \"a\"\n[input]\nmode = \"stdin\"\n[broker]\nport = 0\n")]
#[case::short_keep_alive("team_id = \"a\"\n[input]\nmode = \"stdin\"\n[broker]\nkeep_alive_secs = 0\n")]
#[case::replay_without_path("team_id = \"a\"\n[input]\nmode = \"replay\"\n")]
#[case::zero_timeout("team_id = \"a\"\n[input]\nmode = \"stdin\"\n[timing]\npresence_timeout_ms = 0\n")]
#[case::negative_default("team_id = \"a\"\n[input]\nmode = \"stdin\"\n[balance]\ndefault_balance = -1.0\n")]
#[case::backend_without_placeholder(
    "team_id = \"a\"\n[input]\nmode = \"stdin\"\n[[balance.backends]]\nname = \"x\"\nurl = \"http://h/card\"\n"
)]
#[case::bad_log_level("team_id = \"a\"\n[input]\nmode = \"stdin\"\n[logging]\nlevel = \"tapbridge=loud\"\n")]
fn test_invalid_values_fail_fast(#[case] contents: &str) {
    let config = Config::from_toml_str(contents).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.is_fatal(), "{err}");
}

#[test]
fn test_flags_override_file() {
    let file = write_config(FULL);
    let cli = cli(&[
        "--config",
        file.path().to_str().unwrap(),
        "--team-id",
        "team_z",
        "--broker-port",
        "2883",
        "--log-format",
        "human",
        "--backend",
        "http://a/{uid},http://b/{uid}",
    ]);

    let mut config = Config::load(cli.config.as_deref()).unwrap();
    cli.apply(&mut config);

    assert_eq!(config.team_id, "team_z");
    assert_eq!(config.broker.port, 2883);
    assert_eq!(config.broker.host, "broker.local");
    assert_eq!(config.logging.format, LogFormat::Human);

    let urls: Vec<_> = config.balance.backends.iter().map(|b| b.url.as_str()).collect();
    assert_eq!(urls, vec!["http://a/{uid}", "http://b/{uid}"]);
}

#[test]
fn test_replay_flag_switches_mode() {
    let cli = cli(&["--team-id", "team_a", "--replay", "capture.log"]);

    let mut config = Config::default();
    cli.apply(&mut config);

    assert_eq!(config.input.mode, InputMode::Replay);
    assert_eq!(config.input.replay_path, Some(PathBuf::from("capture.log")));
    assert!(config.validate().is_ok());
}

#[test]
fn test_absent_flags_leave_config_untouched() {
    let config = Config::from_toml_str(FULL).unwrap();
    let mut overlaid = config.clone();
    cli(&[]).apply(&mut overlaid);

    assert_eq!(overlaid, config);
}

#[test]
fn test_shipped_example_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/tapbridge.example.toml");
    let config = Config::load(Some(&path)).unwrap();

    let defaults = Config::default();
    assert_eq!(config.team_id, "team_a");
    assert_eq!(config.input.serial_port.as_deref(), Some("/dev/ttyUSB0"));
    assert_eq!(config.broker, defaults.broker);
    assert_eq!(config.timing, defaults.timing);
    assert_eq!(config.balance, defaults.balance);
    assert_eq!(config.extractor, defaults.extractor);
    assert!(config.validate().is_ok());
}
