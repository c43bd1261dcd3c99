use crate::{
    Result,
    constants::{
        CARD_DETECTED, CARD_REMOVED, MAX_UID_HEX_LENGTH, MIN_UID_HEX_LENGTH, STATUS_OFFLINE,
        STATUS_ONLINE,
    },
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// RFID tag identifier in canonical form (uppercase hex, 8-16 characters).
///
/// Every UID entering the bridge goes through [`Uid::new`], so two reads of
/// the same tag always compare equal regardless of how the firmware or a
/// backend happened to case them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    /// Create a new UID with validation.
    ///
    /// The value is normalized (trimmed and converted to uppercase) before
    /// validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if:
    /// - The length is not between 8-16 characters
    /// - The value contains non-hexadecimal characters
    pub fn new(value: &str) -> Result<Self> {
        let value = value.trim().to_uppercase();

        let len = value.len();
        if !(MIN_UID_HEX_LENGTH..=MAX_UID_HEX_LENGTH).contains(&len) {
            return Err(Error::InvalidUid(format!(
                "UID must be {MIN_UID_HEX_LENGTH}-{MAX_UID_HEX_LENGTH} hex chars, got {len}"
            )));
        }

        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidUid(format!("UID must be hexadecimal: {value}")));
        }

        Ok(Uid(value))
    }

    /// Get the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uid::new(s)
    }
}

impl TryFrom<String> for Uid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Uid::new(&value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// Validate a balance value.
///
/// Balances are non-negative finite numbers.
///
/// # Errors
/// Returns `Error::InvalidBalance` for negative, NaN or infinite values.
pub fn validate_balance(balance: f64) -> Result<f64> {
    if !balance.is_finite() || balance < 0.0 {
        return Err(Error::InvalidBalance(format!(
            "balance must be a non-negative number, got {balance}"
        )));
    }
    Ok(balance)
}

/// A card known to the bridge and its last resolved balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub uid: Uid,
    pub balance: f64,
    pub cached_at: DateTime<Utc>,
}

impl Card {
    /// Create a card entry stamped with the current time.
    pub fn new(uid: Uid, balance: f64) -> Self {
        Self {
            uid,
            balance,
            cached_at: Utc::now(),
        }
    }
}

/// Seconds since the Unix epoch, as carried in every `ts` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimestamp(i64);

impl UnixTimestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Create a timestamp from raw seconds.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Raw seconds since the epoch.
    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presence transition reported on `card/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Detected,
    Removed,
}

impl CardStatus {
    /// Wire literal for this status.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Detected => CARD_DETECTED,
            CardStatus::Removed => CARD_REMOVED,
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge lifecycle as announced on `device/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Online,
    Offline,
}

impl LinkStatus {
    /// Wire literal for this status.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Online => STATUS_ONLINE,
            LinkStatus::Offline => STATUS_OFFLINE,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
