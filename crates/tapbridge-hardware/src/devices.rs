//! Enum wrapper for line source dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! `Box<dyn LineSource>` is not available. The input mode is only known once
//! the configuration is loaded, so the binary wraps whichever source it
//! built in [`AnyLineSource`] and hands that to the bridge loop.
//!
//! # Examples
//!
//! ```
//! use tapbridge_hardware::devices::AnyLineSource;
//! use tapbridge_hardware::mock::MockScanner;
//! use tapbridge_hardware::traits::LineSource;
//!
//! let (scanner, _handle) = MockScanner::new();
//! let source = AnyLineSource::Mock(scanner);
//! assert_eq!(source.name(), "mock-scanner");
//! ```

use std::time::Duration;

use tapbridge_protocol::RawLine;

use crate::{
    Result, mock::MockScanner, reader::ReaderSource, serial::SerialSource, traits::LineSource,
};

/// Enum wrapper for line source dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLineSource {
    /// Physical scanner on a serial port.
    Serial(SerialSource),

    /// Stdin or a replayed capture.
    Reader(ReaderSource),

    /// Mock scanner for development and testing.
    Mock(MockScanner),
}

impl LineSource for AnyLineSource {
    async fn next_line(&mut self, poll: Duration) -> Result<Option<RawLine>> {
        match self {
            Self::Serial(source) => source.next_line(poll).await,
            Self::Reader(source) => source.next_line(poll).await,
            Self::Mock(source) => source.next_line(poll).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Serial(source) => source.name(),
            Self::Reader(source) => source.name(),
            Self::Mock(source) => source.name(),
        }
    }
}

impl From<SerialSource> for AnyLineSource {
    fn from(source: SerialSource) -> Self {
        Self::Serial(source)
    }
}

impl From<ReaderSource> for AnyLineSource {
    fn from(source: ReaderSource) -> Self {
        Self::Reader(source)
    }
}

impl From<MockScanner> for AnyLineSource {
    fn from(source: MockScanner) -> Self {
        Self::Mock(source)
    }
}
