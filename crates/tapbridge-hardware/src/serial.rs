//! Serial port line source.
//!
//! `serialport` exposes a blocking `Read`, so the port is owned by a
//! dedicated OS thread. The worker reads with a short timeout, assembles
//! lines with [`LineParser`], and forwards them to the async side over a
//! bounded channel:
//!
//! ```text
//! ┌──────────────── worker thread ─────────────────┐      ┌──── bridge task ────┐
//! │ open ─> read(timeout) ─> LineParser ─> send ───┼─mpsc─┼> next_line(poll)    │
//! │   ^            │ error                         │      └─────────────────────┘
//! │   └─ backoff <─┘                               │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! A missing device or a read error never surfaces to the bridge as a
//! failure: the worker logs it, waits with exponential backoff and reopens
//! the port. The bridge only sees lines, or silence.

use std::{
    io::{ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use tapbridge_core::{
    Backoff,
    constants::{
        DEFAULT_BAUD_RATE, DEFAULT_SERIAL_POLL_MS, RECONNECT_BACKOFF_INITIAL_MS,
        RECONNECT_BACKOFF_MAX_MS,
    },
};
use tapbridge_protocol::{LineParser, RawLine};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::{HardwareError, Result, traits::LineSource};

/// Lines buffered between the worker thread and the bridge.
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Size of a single serial read.
const READ_CHUNK_SIZE: usize = 256;

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path (`/dev/ttyUSB0`, `COM3`).
    pub port: String,

    /// Baud rate of the scanner firmware.
    pub baud_rate: u32,

    /// Blocking read timeout inside the worker.
    pub read_timeout: Duration,

    /// First reopen delay.
    pub backoff_initial: Duration,

    /// Reopen delay cap.
    pub backoff_max: Duration,
}

impl SerialConfig {
    /// Settings for `port` with every other value at its default.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_SERIAL_POLL_MS),
            backoff_initial: Duration::from_millis(RECONNECT_BACKOFF_INITIAL_MS),
            backoff_max: Duration::from_millis(RECONNECT_BACKOFF_MAX_MS),
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the worker read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::ConfigurationError` for an empty port path, a
    /// zero baud rate or a zero read timeout.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(HardwareError::configuration("serial port path is empty"));
        }
        if self.baud_rate == 0 {
            return Err(HardwareError::configuration("baud rate must be positive"));
        }
        if self.read_timeout.is_zero() {
            return Err(HardwareError::configuration(
                "serial read timeout must be positive",
            ));
        }
        Ok(())
    }
}

/// Line source backed by a physical serial port.
///
/// Dropping the source stops the worker thread within one read timeout.
#[derive(Debug)]
pub struct SerialSource {
    line_rx: mpsc::Receiver<RawLine>,
    stop: Arc<AtomicBool>,
    name: String,
}

impl SerialSource {
    /// Validate `config` and start the worker thread.
    ///
    /// The port does not need to exist yet: the worker keeps retrying with
    /// backoff until the scanner is plugged in.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::ConfigurationError` for invalid settings and
    /// `HardwareError::InitializationFailed` if the thread cannot be spawned.
    pub fn spawn(config: SerialConfig) -> Result<Self> {
        config.validate()?;

        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let name = config.port.clone();

        let worker_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || run_worker(config, line_tx, worker_stop))
            .map_err(|e| {
                HardwareError::initialization_failed(format!("cannot spawn serial worker: {e}"))
            })?;

        Ok(Self {
            line_rx,
            stop,
            name,
        })
    }
}

impl LineSource for SerialSource {
    async fn next_line(&mut self, poll: Duration) -> Result<Option<RawLine>> {
        match tokio::time::timeout(poll, self.line_rx.recv()).await {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => Err(HardwareError::disconnected(self.name.clone())),
            Err(_elapsed) => Ok(None),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Outcome of one open port session.
enum Session {
    /// The port failed; reopen after a delay.
    Failed,

    /// The bridge is gone or asked to stop.
    Stopped,
}

fn run_worker(config: SerialConfig, line_tx: mpsc::Sender<RawLine>, stop: Arc<AtomicBool>) {
    let mut backoff = Backoff::new(config.backoff_initial, config.backoff_max);
    let mut parser = LineParser::new();

    while !stop.load(Ordering::Relaxed) {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(config.read_timeout)
            .open();

        let session = match port {
            Ok(port) => {
                info!(port = %config.port, baud_rate = config.baud_rate, "Serial port opened");
                backoff.reset();
                parser.clear();
                read_session(port, &mut parser, &line_tx, &stop, &config.port)
            }
            Err(e) => {
                warn!(
                    port = %config.port,
                    error = %e,
                    attempt = backoff.attempts() + 1,
                    "Failed to open serial port"
                );
                Session::Failed
            }
        };

        match session {
            Session::Stopped => break,
            Session::Failed => sleep_unless_stopped(backoff.next_delay(), &stop),
        }
    }

    debug!(port = %config.port, "Serial worker stopped");
}

fn read_session(
    mut port: Box<dyn serialport::SerialPort>,
    parser: &mut LineParser,
    line_tx: &mpsc::Sender<RawLine>,
    stop: &AtomicBool,
    port_name: &str,
) -> Session {
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        if stop.load(Ordering::Relaxed) || line_tx.is_closed() {
            return Session::Stopped;
        }

        match port.read(&mut chunk) {
            Ok(0) => continue,
            Ok(n) => {
                trace!(port = %port_name, bytes = n, "Serial read");
                parser.feed(&chunk[..n]);
                for line in parser.drain_lines() {
                    if line_tx.blocking_send(line).is_err() {
                        return Session::Stopped;
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => continue,
            Err(e) => {
                warn!(port = %port_name, error = %e, "Serial read failed, reopening port");
                return Session::Failed;
            }
        }
    }
}

/// Sleep in short slices so a stop request is honored promptly.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(50);

    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let step = remaining.min(SLICE);
        thread::sleep(step);
        remaining -= step;
    }
}
