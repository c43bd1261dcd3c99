//! Line source over any async reader.
//!
//! Used for bench work without a scanner attached: typing UIDs on stdin, or
//! replaying a serial capture file recorded from a real device.

use std::{fmt, path::Path, pin::Pin, time::Duration};

use futures::StreamExt;
use tapbridge_protocol::{LineCodec, RawLine};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::{HardwareError, Result, traits::LineSource};

type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// Line source reading newline-delimited records from an `AsyncRead`.
///
/// End of input is reported as [`HardwareError::Exhausted`] on every
/// subsequent poll.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tapbridge_hardware::{ReaderSource, traits::LineSource};
///
/// #[tokio::main]
/// async fn main() -> tapbridge_hardware::Result<()> {
///     let capture: &[u8] = b"System ready\nA1B2C3D4\n";
///     let mut source = ReaderSource::new("capture", capture);
///
///     let poll = Duration::from_millis(100);
///     assert_eq!(source.next_line(poll).await?.unwrap().as_bytes(), b"System ready");
///     assert_eq!(source.next_line(poll).await?.unwrap().as_bytes(), b"A1B2C3D4");
///     assert!(source.next_line(poll).await.is_err());
///     Ok(())
/// }
/// ```
pub struct ReaderSource {
    lines: FramedRead<BoxedReader, LineCodec>,
    name: String,
    finished: bool,
}

impl ReaderSource {
    /// Wrap any async reader.
    pub fn new(name: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        let reader: BoxedReader = Box::pin(reader);
        Self {
            lines: FramedRead::new(reader, LineCodec::new()),
            name: name.into(),
            finished: false,
        }
    }

    /// Read lines typed on the process standard input.
    pub fn stdin() -> Self {
        Self::new("stdin", tokio::io::stdin())
    }

    /// Replay a captured serial log.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the file cannot be
    /// opened.
    pub async fn replay(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            HardwareError::initialization_failed(format!(
                "cannot open replay file {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self::new(path.display().to_string(), file))
    }
}

impl fmt::Debug for ReaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderSource")
            .field("name", &self.name)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl LineSource for ReaderSource {
    async fn next_line(&mut self, poll: Duration) -> Result<Option<RawLine>> {
        if self.finished {
            return Err(HardwareError::exhausted(self.name.clone()));
        }

        match tokio::time::timeout(poll, self.lines.next()).await {
            Err(_elapsed) => Ok(None),
            Ok(Some(Ok(line))) => Ok(Some(line)),
            Ok(Some(Err(e))) => Err(HardwareError::communication(format!(
                "{}: {e}",
                self.name
            ))),
            Ok(None) => {
                debug!(source = %self.name, "Reader reached end of input");
                self.finished = true;
                Err(HardwareError::exhausted(self.name.clone()))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
