//! Tokio codec for newline-delimited scanner output.
//!
//! `LineCodec` wraps the [`LineParser`] so that any `AsyncRead` (stdin, a
//! replayed capture file, a pseudo terminal) can be turned into a stream of
//! [`RawLine`]s with `tokio_util::codec::FramedRead`.
//!
//! ```text
//! AsyncRead -> Decoder -> RawLine
//! ```
//!
//! # Usage with FramedRead
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use tokio_util::codec::FramedRead;
//! use tapbridge_protocol::LineCodec;
//!
//! # async fn example() -> tapbridge_core::Result<()> {
//! let mut lines = FramedRead::new(tokio::io::stdin(), LineCodec::new());
//!
//! while let Some(line) = lines.next().await {
//!     println!("scanner: {}", line?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The codec is decode-only: the bridge never writes to the scanner.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::{LineParser, RawLine};
use tapbridge_core::{Error, Result};

/// Tokio decoder producing one [`RawLine`] per newline-terminated record.
///
/// Overlong lines are dropped by the underlying parser rather than reported
/// as errors: a noisy scanner must not terminate the stream.
#[derive(Debug, Default)]
pub struct LineCodec {
    parser: LineParser,
}

impl LineCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self {
            parser: LineParser::new(),
        }
    }

    /// Number of overlong lines dropped so far.
    pub fn dropped_lines(&self) -> u64 {
        self.parser.dropped_lines()
    }
}

impl Decoder for LineCodec {
    type Item = RawLine;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // The parser owns every byte from here on.
            self.parser.feed(src);
            src.clear();
        }

        Ok(self.parser.next_line())
    }

    /// Flush the final unterminated line when the reader hits end of file.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        Ok(self.parser.take_partial())
    }
}
