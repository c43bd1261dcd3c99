//! Line parser for the scanner's serial stream.
//!
//! The scanner firmware writes one ASCII record per line, but a serial read
//! returns whatever bytes happen to be in the UART buffer: half a line, three
//! lines, or a line followed by the start of the next one. This module
//! provides a stateful parser that accumulates bytes and hands out complete
//! lines.
//!
//! # Line Framing
//!
//! ```text
//! <payload> [CR] LF
//! A1B2C3D4  \r   \n
//! ```
//!
//! The trailing `\r` is optional (the firmware prints with `println`, some
//! USB bridges translate to CRLF). Both terminators are stripped from the
//! returned line.
//!
//! # Usage
//!
//! ```
//! use tapbridge_protocol::LineParser;
//!
//! let mut parser = LineParser::new();
//!
//! // Feed partial data from the serial port
//! parser.feed(b"A1B2");
//! parser.feed(b"C3D4\r\nwifi ");
//!
//! let line = parser.next_line().unwrap();
//! assert_eq!(line.as_bytes(), b"A1B2C3D4");
//! assert!(parser.next_line().is_none()); // "wifi " is still incomplete
//! ```
//!
//! # Bounded Memory
//!
//! A scanner that stops emitting newlines (wrong baud rate, electrical
//! noise) must not grow the buffer forever. Once the pending line exceeds
//! [`MAX_LINE_LENGTH`] the parser drops it and skips everything up to the
//! next newline.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::fmt;
use tapbridge_core::constants::MAX_LINE_LENGTH;

/// Initial buffer capacity for incoming serial data.
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Recommended initial capacity for the line queue.
const INITIAL_LINE_QUEUE_CAPACITY: usize = 4;

const LF: u8 = b'\n';
const CR: u8 = b'\r';

/// One complete line read from the serial stream, terminators removed.
///
/// The bytes are kept raw: decoding is the job of the frame extractor,
/// which needs the original bytes when the line is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(Bytes);

impl RawLine {
    /// Wrap already-delimited bytes (terminators are stripped).
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        let mut end = bytes.len();
        while end > 0 && matches!(bytes[end - 1], CR | LF) {
            end -= 1;
        }
        Self(bytes.slice(..end))
    }

    /// Raw line bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the line carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Line length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Lossy text rendering, for logging.
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for RawLine {
    fn from(value: &str) -> Self {
        RawLine::new(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<Vec<u8>> for RawLine {
    fn from(value: Vec<u8>) -> Self {
        RawLine::new(value)
    }
}

impl fmt::Display for RawLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text_lossy())
    }
}

/// State machine states for line assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Accumulating bytes of the current line.
    Collecting,

    /// The current line overflowed; bytes are dropped until the next LF.
    Discarding,
}

/// Stateful line parser for the serial stream.
///
/// ```text
/// ┌────────────┐  LF          ┌────────────┐
/// │ Collecting │─────────────>│ Line ready │
/// └────────────┘              └────────────┘
///    │      ^
///    │ len > MAX_LINE_LENGTH
///    v      │ LF
/// ┌────────────┐
/// │ Discarding │
/// └────────────┘
/// ```
#[derive(Debug)]
pub struct LineParser {
    /// Bytes of the line being assembled.
    buffer: BytesMut,

    /// Current state of the parser state machine.
    state: ParserState,

    /// Complete lines ready for extraction.
    lines: VecDeque<RawLine>,

    /// Number of overflowed lines dropped since creation.
    dropped: u64,
}

impl LineParser {
    /// Create a new line parser.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ParserState::Collecting,
            lines: VecDeque::with_capacity(INITIAL_LINE_QUEUE_CAPACITY),
            dropped: 0,
        }
    }

    /// Feed bytes read from the serial port.
    ///
    /// Every complete line found in `bytes` is queued; a trailing partial
    /// line stays buffered until the next call.
    pub fn feed(&mut self, bytes: &[u8]) {
        let mut rest = bytes;

        while !rest.is_empty() {
            match rest.iter().position(|&b| b == LF) {
                Some(lf_pos) => {
                    self.push_segment(&rest[..lf_pos]);
                    self.finish_line();
                    rest = &rest[lf_pos + 1..];
                }
                None => {
                    self.push_segment(rest);
                    rest = &[];
                }
            }
        }
    }

    /// Extract the next complete line, if any.
    pub fn next_line(&mut self) -> Option<RawLine> {
        self.lines.pop_front()
    }

    /// Take the pending partial line, if any.
    ///
    /// Used at end of stream, where the last line may lack a terminator.
    pub fn take_partial(&mut self) -> Option<RawLine> {
        if self.state == ParserState::Discarding {
            self.state = ParserState::Collecting;
            self.buffer.clear();
            return None;
        }
        if self.buffer.is_empty() {
            return None;
        }
        Some(RawLine::new(self.buffer.split().freeze()))
    }

    /// Returns current parser state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Returns number of lines ready for extraction.
    pub fn lines_available(&self) -> usize {
        self.lines.len()
    }

    /// Number of overlong lines dropped so far.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped
    }

    /// Clear all internal buffers and reset state.
    ///
    /// Called after the serial port is reopened, since bytes from the old
    /// session cannot be joined with the new one.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.lines.clear();
        self.state = ParserState::Collecting;
    }

    /// Returns an iterator that drains all currently available lines.
    pub fn drain_lines(&mut self) -> impl Iterator<Item = RawLine> + '_ {
        self.lines.drain(..)
    }

    fn push_segment(&mut self, segment: &[u8]) {
        if self.state == ParserState::Discarding {
            return;
        }

        if self.buffer.len() + segment.len() > MAX_LINE_LENGTH {
            self.buffer.clear();
            self.state = ParserState::Discarding;
            self.dropped += 1;
            return;
        }

        self.buffer.extend_from_slice(segment);
    }

    fn finish_line(&mut self) {
        if self.state == ParserState::Discarding {
            self.state = ParserState::Collecting;
            return;
        }

        let line = RawLine::new(self.buffer.split().freeze());
        self.lines.push_back(line);
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut parser = LineParser::new();
        parser.feed(b"A1B2C3D4\n");

        let line = parser.next_line().unwrap();
        assert_eq!(line.as_bytes(), b"A1B2C3D4");
        assert!(parser.next_line().is_none());
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut parser = LineParser::new();
        parser.feed(b"A1B2C3D4\r\n");

        assert_eq!(parser.next_line().unwrap().as_bytes(), b"A1B2C3D4");
    }

    #[test]
    fn test_partial_line_across_feeds() {
        let mut parser = LineParser::new();
        parser.feed(b"A1B2");
        assert_eq!(parser.lines_available(), 0);

        parser.feed(b"C3D4");
        assert_eq!(parser.lines_available(), 0);

        parser.feed(b"\n");
        assert_eq!(parser.next_line().unwrap().as_bytes(), b"A1B2C3D4");
    }

    #[test]
    fn test_multiple_lines_in_one_feed() {
        let mut parser = LineParser::new();
        parser.feed(b"Connecting to WiFi...\nA1B2C3D4\nREADY\n");

        let lines: Vec<_> = parser.drain_lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_bytes(), b"Connecting to WiFi...");
        assert_eq!(lines[1].as_bytes(), b"A1B2C3D4");
        assert_eq!(lines[2].as_bytes(), b"READY");
        assert_eq!(parser.lines_available(), 0);
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let mut parser = LineParser::new();
        parser.feed(b"\r\n\n");

        assert_eq!(parser.lines_available(), 2);
        assert!(parser.next_line().unwrap().is_empty());
    }

    #[test]
    fn test_binary_bytes_preserved() {
        let mut parser = LineParser::new();
        parser.feed(&[0xDE, 0xAD, 0xBE, 0xEF, b'\n']);

        assert_eq!(
            parser.next_line().unwrap().as_bytes(),
            &[0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut parser = LineParser::new();
        parser.feed(&vec![b'x'; MAX_LINE_LENGTH + 1]);
        assert_eq!(parser.state(), ParserState::Discarding);

        parser.feed(b"still garbage\nA1B2C3D4\n");

        assert_eq!(parser.dropped_lines(), 1);
        assert_eq!(parser.state(), ParserState::Collecting);
        assert_eq!(parser.next_line().unwrap().as_bytes(), b"A1B2C3D4");
        assert!(parser.next_line().is_none());
    }

    #[test]
    fn test_take_partial() {
        let mut parser = LineParser::new();
        parser.feed(b"A1B2C3D4\nDEADBEEF");

        assert_eq!(parser.next_line().unwrap().as_bytes(), b"A1B2C3D4");
        assert_eq!(parser.take_partial().unwrap().as_bytes(), b"DEADBEEF");
        assert!(parser.take_partial().is_none());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut parser = LineParser::new();
        parser.feed(b"A1B2C3D4\nhalf");
        parser.clear();

        assert_eq!(parser.lines_available(), 0);
        assert!(parser.take_partial().is_none());
        assert_eq!(parser.state(), ParserState::Collecting);
    }

    #[test]
    fn test_raw_line_from_str_strips_terminators() {
        let line = RawLine::from("A1B2C3D4\r\n");
        assert_eq!(line.as_bytes(), b"A1B2C3D4");
        assert_eq!(line.to_string(), "A1B2C3D4");
        assert_eq!(line.len(), 8);
    }
}
