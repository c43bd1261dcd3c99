//! Classification of scanner lines into UID frames and firmware chatter.
//!
//! The scanner shares one serial port between card reads and its own boot and
//! network log. A card read is a bare hex UID; log output is free text that
//! may also contain hex (MAC addresses, hashes). The extractor decides which
//! is which.
//!
//! # Rules
//!
//! 1. Invalid UTF-8 sequences are dropped and the remaining text goes
//!    through the rules below. If that yields no UID and no diagnostic
//!    keyword, the raw bytes are hex-encoded; 8-16 hex characters make a UID.
//! 2. Blank lines are noise.
//! 3. A line containing a diagnostic keyword is a log line, even when it
//!    carries a hex token.
//! 4. A line with a bounded hex token of 8-16 characters is a UID frame.
//! 5. Everything else is a log line.
//!
//! A token is bounded when it starts and ends on a word boundary, so it is
//! never a slice of a longer alphanumeric run.
//!
//! # Example
//!
//! ```
//! use tapbridge_protocol::{FrameExtractor, ScanFrame};
//!
//! let extractor = FrameExtractor::default();
//!
//! match extractor.classify(b"tag seen: a1b2c3d4 ok") {
//!     ScanFrame::Uid(uid) => assert_eq!(uid.as_str(), "A1B2C3D4"),
//!     other => panic!("unexpected frame: {other:?}"),
//! }
//!
//! assert!(matches!(
//!     extractor.classify(b"wifi connecting DEADBEEF"),
//!     ScanFrame::Log(_)
//! ));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tapbridge_core::{Uid, constants::DEFAULT_DIAGNOSTIC_KEYWORDS};

/// Bounded hex token of 8-16 characters.
static UID_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9A-Fa-f]{8,16})\b").expect("UID token pattern is valid")
});

/// Classified scanner line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFrame {
    /// A card read.
    Uid(Uid),

    /// Firmware diagnostic or other free text (trimmed).
    Log(String),

    /// Nothing usable.
    Noise,
}

impl ScanFrame {
    /// Returns the UID if this frame is a card read.
    pub fn uid(&self) -> Option<&Uid> {
        match self {
            ScanFrame::Uid(uid) => Some(uid),
            _ => None,
        }
    }
}

/// Stateless line classifier.
///
/// Holds the diagnostic keyword list, lowercased once at construction.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    keywords: Vec<String>,
}

impl FrameExtractor {
    /// Create an extractor with a custom keyword list.
    ///
    /// Keywords are trimmed and lowercased; blank entries are ignored. An
    /// empty list disables the diagnostic filter entirely.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self { keywords }
    }

    /// Configured keywords, lowercased.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Classify one raw line.
    ///
    /// Never fails: the worst outcome is [`ScanFrame::Noise`].
    pub fn classify(&self, raw: &[u8]) -> ScanFrame {
        let raw = raw.trim_ascii();
        if let Ok(text) = std::str::from_utf8(raw) {
            return self.classify_text(text);
        }

        let decoded: String = raw.utf8_chunks().map(|chunk| chunk.valid()).collect();
        match self.classify_text(&decoded) {
            ScanFrame::Uid(uid) => ScanFrame::Uid(uid),
            frame if self.is_diagnostic(&decoded) => frame,
            frame => Self::classify_binary(raw).unwrap_or(frame),
        }
    }

    /// Classify a line that is already decoded.
    pub fn classify_text(&self, line: &str) -> ScanFrame {
        let line = line.trim();
        if line.is_empty() {
            return ScanFrame::Noise;
        }

        if self.is_diagnostic(line) {
            return ScanFrame::Log(line.to_string());
        }

        let token = UID_TOKEN
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());

        match token.map(Uid::new) {
            Some(Ok(uid)) => ScanFrame::Uid(uid),
            _ => ScanFrame::Log(line.to_string()),
        }
    }

    /// Returns `true` if the line contains any diagnostic keyword.
    pub fn is_diagnostic(&self, line: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let lowered = line.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    fn classify_binary(raw: &[u8]) -> Option<ScanFrame> {
        Uid::new(&hex::encode_upper(raw)).ok().map(ScanFrame::Uid)
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn uid(s: &str) -> ScanFrame {
        ScanFrame::Uid(Uid::new(s).unwrap())
    }

    #[rstest]
    #[case(b"A1B2C3D4".as_slice(), "A1B2C3D4")]
    #[case(b"a1b2c3d4", "A1B2C3D4")]
    #[case(b"tag seen: a1b2c3d4 ok", "A1B2C3D4")]
    #[case(b"  04A1B2C3D4E5F6\r", "04A1B2C3D4E5F6")]
    #[case(b"UID=0123456789abcdef", "0123456789ABCDEF")]
    #[case(b"[DEADBEEF]", "DEADBEEF")]
    fn test_uid_lines(#[case] line: &[u8], #[case] expected: &str) {
        let extractor = FrameExtractor::default();
        assert_eq!(extractor.classify(line), uid(expected));
    }

    #[rstest]
    #[case("wifi connecting DEADBEEF")]
    #[case("Connecting to broker")]
    #[case("MQTT connected, client A1B2C3D4")]
    #[case("IP address: 192.168.1.10")]
    #[case("System READY")]
    #[case("Health check ok")]
    #[case("time sync 0011223344")]
    fn test_diagnostic_lines(#[case] line: &str) {
        let extractor = FrameExtractor::default();
        assert_eq!(
            extractor.classify(line.as_bytes()),
            ScanFrame::Log(line.to_string())
        );
    }

    #[rstest]
    #[case("A1B2C3")] // too short
    #[case("0123456789ABCDEF01")] // too long, no bounded sub-token
    #[case("xA1B2C3D4")] // glued to a letter
    #[case("A1B2C3D4_")] // underscore is a word character
    #[case("boot done")]
    fn test_text_without_token(#[case] line: &str) {
        let extractor = FrameExtractor::default();
        assert_eq!(
            extractor.classify(line.as_bytes()),
            ScanFrame::Log(line.to_string())
        );
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"   ")]
    #[case(b"\r\n")]
    fn test_blank_is_noise(#[case] line: &[u8]) {
        assert_eq!(FrameExtractor::default().classify(line), ScanFrame::Noise);
    }

    #[test]
    fn test_binary_line_is_hex_encoded() {
        let extractor = FrameExtractor::default();
        assert_eq!(
            extractor.classify(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01]),
            uid("DEADBEEF01")
        );
    }

    #[rstest]
    #[case(b"A1B2C3D4\xff".as_slice(), "A1B2C3D4")]
    #[case(b"\x80A1B2C3D4", "A1B2C3D4")]
    #[case(b"A1B2\xffC3D4", "A1B2C3D4")]
    #[case(b"tag seen: a1b2c3d4 ok \x80", "A1B2C3D4")]
    fn test_uid_survives_stray_invalid_bytes(#[case] line: &[u8], #[case] expected: &str) {
        let extractor = FrameExtractor::default();
        assert_eq!(extractor.classify(line), uid(expected));
    }

    #[test]
    fn test_diagnostic_with_invalid_bytes_stays_log() {
        let extractor = FrameExtractor::default();
        assert!(matches!(
            extractor.classify(b"wifi \xff\xfe"),
            ScanFrame::Log(_)
        ));
    }

    #[rstest]
    #[case(&[0xFF, 0xFE][..])] // 4 hex chars
    #[case(&[0xFF; 9][..])] // 18 hex chars
    fn test_binary_line_out_of_range_is_noise(#[case] raw: &[u8]) {
        assert_eq!(FrameExtractor::default().classify(raw), ScanFrame::Noise);
    }

    #[test]
    fn test_custom_keywords() {
        let extractor = FrameExtractor::new(["  BOOT ", ""]);
        assert_eq!(extractor.keywords(), ["boot".to_string()]);

        assert!(matches!(
            extractor.classify(b"boot A1B2C3D4"),
            ScanFrame::Log(_)
        ));
        // Default keywords no longer apply
        assert_eq!(extractor.classify(b"wifi A1B2C3D4"), uid("A1B2C3D4"));
    }

    #[test]
    fn test_empty_keyword_list_disables_filter() {
        let extractor = FrameExtractor::new(Vec::<String>::new());
        assert!(!extractor.is_diagnostic("wifi connecting"));
        assert_eq!(
            extractor.classify(b"wifi connecting DEADBEEF"),
            uid("DEADBEEF")
        );
    }

    #[test]
    fn test_frame_uid_accessor() {
        assert_eq!(uid("A1B2C3D4").uid().unwrap().as_str(), "A1B2C3D4");
        assert!(ScanFrame::Noise.uid().is_none());
    }
}
