//! Scanner-side input for the tapbridge bridge.
//!
//! This crate turns the scanner's output into a stream of [`RawLine`]s
//! behind a single trait, [`LineSource`], so the bridge loop does not care
//! whether lines come from a serial port, a terminal, a capture file, or a
//! test.
//!
//! # Sources
//!
//! | Source | Use |
//! |--------|-----|
//! | [`SerialSource`] | Scanner on a serial port, reopened with backoff on failure |
//! | [`ReaderSource`] | Any `AsyncRead`: stdin for typing UIDs, or replay of a capture file |
//! | [`MockScanner`] | Programmatic output for tests |
//!
//! ```no_run
//! use std::time::Duration;
//! use tapbridge_hardware::{AnyLineSource, SerialConfig, SerialSource, traits::LineSource};
//!
//! # async fn example() -> tapbridge_hardware::Result<()> {
//! let serial = SerialSource::spawn(SerialConfig::new("/dev/ttyUSB0"))?;
//! let mut source = AnyLineSource::from(serial);
//!
//! if let Some(line) = source.next_line(Duration::from_millis(100)).await? {
//!     println!("{}: {line}", source.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] which uses the
//! [`HardwareError`] error type. [`HardwareError::is_terminal`] tells a
//! caller whether polling again is pointless.
//!
//! [`RawLine`]: tapbridge_protocol::RawLine
//! [`LineSource`]: traits::LineSource
//! [`MockScanner`]: mock::MockScanner

pub mod devices;
pub mod error;
pub mod mock;
pub mod reader;
pub mod serial;
pub mod traits;

// Re-export commonly used types for convenience
pub use devices::AnyLineSource;
pub use error::{HardwareError, Result};
pub use reader::ReaderSource;
pub use serial::{SerialConfig, SerialSource};
pub use traits::LineSource;
