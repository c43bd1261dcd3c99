//! Line source trait definition.
//!
//! The bridge only needs one thing from the scanner side: the next line of
//! output, without ever blocking longer than the caller allows. Everything
//! else (serial port settings, reconnection, replay files) is an
//! implementation detail of the concrete source.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use tapbridge_protocol::RawLine;

use crate::error::Result;

/// Producer of scanner output lines.
///
/// # Polling Contract
///
/// `next_line` waits at most `poll` for a line:
///
/// - `Ok(Some(line))`: a complete line, terminators stripped.
/// - `Ok(None)`: nothing arrived within `poll`. This is the normal idle case.
/// - `Err(e)` with [`HardwareError::is_terminal`]: the source will never
///   produce another line.
/// - Any other `Err`: a transient failure; the caller may poll again.
///
/// Implementations must be cancel-safe: dropping the returned future must
/// not lose a line that was already read from the device.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrapper
/// [`AnyLineSource`](crate::devices::AnyLineSource) when the concrete source
/// is chosen at runtime.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tapbridge_hardware::traits::LineSource;
/// use tapbridge_hardware::Result;
///
/// async fn drain<S: LineSource>(source: &mut S) -> Result<usize> {
///     let mut count = 0;
///     while let Some(line) = source.next_line(Duration::from_millis(100)).await? {
///         println!("{}: {line}", source.name());
///         count += 1;
///     }
///     Ok(count)
/// }
/// ```
///
/// [`HardwareError::is_terminal`]: crate::HardwareError::is_terminal
pub trait LineSource: Send {
    /// Wait up to `poll` for the next line.
    ///
    /// # Errors
    ///
    /// See the polling contract above.
    async fn next_line(&mut self, poll: Duration) -> Result<Option<RawLine>>;

    /// Human readable source name for logs (port path, `stdin`, file path).
    fn name(&self) -> &str;
}
