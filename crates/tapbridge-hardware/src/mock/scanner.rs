//! Mock scanner implementation for testing and development.
//!
//! This module provides a simulated scanner whose output is pushed through a
//! handle, line by line, exactly as the serial worker would deliver it.

use std::time::Duration;

use tapbridge_protocol::RawLine;
use tokio::sync::mpsc;

use crate::{HardwareError, Result, traits::LineSource};

/// Channel capacity between the handle and the mock scanner.
const MOCK_CHANNEL_CAPACITY: usize = 64;

/// Mock scanner for testing and development.
///
/// Lines written through the [`MockScannerHandle`] come out of
/// [`LineSource::next_line`] in order. Dropping every handle ends the stream,
/// which the source reports as exhausted.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tapbridge_hardware::mock::MockScanner;
/// use tapbridge_hardware::traits::LineSource;
///
/// #[tokio::main]
/// async fn main() -> tapbridge_hardware::Result<()> {
///     let (mut scanner, handle) = MockScanner::new();
///
///     handle.send_line("A1B2C3D4").await?;
///
///     let line = scanner.next_line(Duration::from_millis(100)).await?.unwrap();
///     assert_eq!(line.as_bytes(), b"A1B2C3D4");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockScanner {
    /// Channel receiver for scanner output
    line_rx: mpsc::Receiver<RawLine>,

    /// Source name
    name: String,
}

impl MockScanner {
    /// Create a new mock scanner with the default name.
    ///
    /// Returns a tuple of (MockScanner, MockScannerHandle) where the handle
    /// is used to simulate scanner output.
    pub fn new() -> (Self, MockScannerHandle) {
        Self::with_name("mock-scanner")
    }

    /// Create a new mock scanner with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockScannerHandle) {
        let (line_tx, line_rx) = mpsc::channel(MOCK_CHANNEL_CAPACITY);
        let name = name.into();

        let scanner = Self {
            line_rx,
            name: name.clone(),
        };
        let handle = MockScannerHandle { line_tx, name };

        (scanner, handle)
    }
}

impl LineSource for MockScanner {
    async fn next_line(&mut self, poll: Duration) -> Result<Option<RawLine>> {
        match tokio::time::timeout(poll, self.line_rx.recv()).await {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => Err(HardwareError::exhausted(self.name.clone())),
            Err(_elapsed) => Ok(None),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for controlling a mock scanner.
///
/// Cloneable, so a test can feed the scanner from several tasks.
#[derive(Debug, Clone)]
pub struct MockScannerHandle {
    /// Channel sender for scanner output
    line_tx: mpsc::Sender<RawLine>,

    /// Source name
    name: String,
}

impl MockScannerHandle {
    /// Emit one line of text, as the firmware would print it.
    ///
    /// # Errors
    ///
    /// Returns an error if the scanner has been dropped.
    pub async fn send_line(&self, line: &str) -> Result<()> {
        self.send_raw(RawLine::from(line)).await
    }

    /// Emit one line of raw bytes (for non-UTF-8 firmware output).
    ///
    /// # Errors
    ///
    /// Returns an error if the scanner has been dropped.
    pub async fn send_bytes(&self, bytes: Vec<u8>) -> Result<()> {
        self.send_raw(RawLine::from(bytes)).await
    }

    async fn send_raw(&self, line: RawLine) -> Result<()> {
        self.line_tx
            .send(line)
            .await
            .map_err(|_| HardwareError::disconnected(self.name.clone()))
    }

    /// Get the source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the scanner side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.line_tx.is_closed()
    }
}
