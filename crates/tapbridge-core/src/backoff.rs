//! Exponential reconnect delay shared by the serial and broker transports.

use std::time::Duration;

use crate::constants::{RECONNECT_BACKOFF_INITIAL_MS, RECONNECT_BACKOFF_MAX_MS};

/// Doubling delay, capped at a maximum.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tapbridge_core::Backoff;
///
/// let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(4));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(2));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(4));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(4));
///
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// Create a backoff starting at `initial` and never exceeding `max`.
    ///
    /// A zero `initial` is bumped to one millisecond so the delay can grow.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt. Doubles on every call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(RECONNECT_BACKOFF_INITIAL_MS),
            Duration::from_millis(RECONNECT_BACKOFF_MAX_MS),
        )
    }
}
