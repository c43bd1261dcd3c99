//! Core constants for the tapbridge scanner bridge.
//!
//! This module collects the protocol-level constants and the operational
//! defaults used throughout the bridge. Topic names, payload literals and UID
//! bounds define the wire contract with downstream services; the timing and
//! balance defaults are what the bridge runs with when the configuration does
//! not override them.
//!
//! # Topic Structure
//!
//! Every topic is rooted at a per-team namespace:
//!
//! ```text
//! rfid/<team_id>/<suffix>
//! ```
//!
//! | Suffix | Direction | Payload |
//! |--------|-----------|---------|
//! | `card/status` | publish | JSON `{uid, balance?, status, ts}` |
//! | `card/balance` | publish | JSON `{uid, new_balance, amount?, status, ts}` |
//! | `card/topup` | subscribe | JSON `{uid, amount?, new_balance?}` |
//! | `device/health` | publish | JSON `{status, ip, rssi, free_heap, ts}` |
//! | `device/status` | publish, retained, last will | `online` / `offline` |
//!
//! # Usage
//!
//! ```
//! use tapbridge_core::constants::*;
//!
//! let topic = format!("{TOPIC_ROOT}/team_a/{TOPIC_CARD_STATUS}");
//! assert_eq!(topic, "rfid/team_a/card/status");
//!
//! use std::time::Duration;
//! let timeout = Duration::from_millis(DEFAULT_PRESENCE_TIMEOUT_MS);
//! assert_eq!(timeout.as_secs_f64(), 2.0);
//! ```

// ============================================================================
// Topics
// ============================================================================

/// Root namespace shared by every bridge topic.
pub const TOPIC_ROOT: &str = "rfid";

/// Card presence transitions (`detected` / `removed`).
pub const TOPIC_CARD_STATUS: &str = "card/status";

/// Top-up confirmations published by the bridge.
pub const TOPIC_CARD_BALANCE: &str = "card/balance";

/// Top-up commands consumed by the bridge.
pub const TOPIC_CARD_TOPUP: &str = "card/topup";

/// Periodic heartbeat.
pub const TOPIC_DEVICE_HEALTH: &str = "device/health";

/// Lifecycle topic carrying the retained `online` / `offline` literal.
///
/// This is also the topic registered as the broker last will.
pub const TOPIC_DEVICE_STATUS: &str = "device/status";

// ============================================================================
// Payload Literals
// ============================================================================

/// Lifecycle payload published on startup and after every reconnection.
pub const STATUS_ONLINE: &str = "online";

/// Lifecycle payload published on shutdown and registered as last will.
pub const STATUS_OFFLINE: &str = "offline";

/// Card status value for an arrival.
pub const CARD_DETECTED: &str = "detected";

/// Card status value for a removal.
pub const CARD_REMOVED: &str = "removed";

/// Status value carried by every top-up confirmation.
pub const TOPUP_SUCCESS: &str = "success";

// ============================================================================
// UID Bounds
// ============================================================================

/// Minimum UID length in hexadecimal characters (4-byte NUID).
pub const MIN_UID_HEX_LENGTH: usize = 8;

/// Maximum UID length in hexadecimal characters (8-byte UID).
///
/// 7-byte ISO 14443 UIDs (14 characters) fall inside the range.
pub const MAX_UID_HEX_LENGTH: usize = 16;

// ============================================================================
// Frame Extraction
// ============================================================================

/// Diagnostic keywords that mark a serial line as firmware log output.
///
/// Matching is a case-insensitive substring test. A line containing any of
/// these words is never treated as a card scan, even when it also contains a
/// hex token of valid length (boot logs print addresses and hashes).
pub const DEFAULT_DIAGNOSTIC_KEYWORDS: &[&str] = &[
    "connecting",
    "wifi",
    "ip",
    "sync",
    "system",
    "mqtt",
    "health",
    "ready",
];

/// Longest serial line accepted before the buffer is discarded.
pub const MAX_LINE_LENGTH: usize = 1024;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Interval between two heartbeats on `device/health`, in seconds.
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 60;

/// Silence after which a present card is considered removed, in milliseconds.
pub const DEFAULT_PRESENCE_TIMEOUT_MS: u64 = 2000;

/// Delay applied after each processed UID frame, in milliseconds.
///
/// A single physical tap produces several identical reads on noisy hardware.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Idle delay between loop iterations, in milliseconds.
pub const DEFAULT_IDLE_DELAY_MS: u64 = 100;

/// Serial read poll timeout, in milliseconds.
pub const DEFAULT_SERIAL_POLL_MS: u64 = 100;

/// Per-endpoint timeout for remote balance lookups, in milliseconds.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Balance Defaults
// ============================================================================

/// Starting balance for a card unknown to every backend and to the cache.
pub const DEFAULT_BALANCE: f64 = 50.0;

// ============================================================================
// Transport Defaults
// ============================================================================

/// Default serial baud rate of the scanner firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default MQTT broker port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default MQTT keep-alive, in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Initial delay before reconnecting a lost transport, in milliseconds.
pub const RECONNECT_BACKOFF_INITIAL_MS: u64 = 1000;

/// Upper bound for the reconnect backoff, in milliseconds.
pub const RECONNECT_BACKOFF_MAX_MS: u64 = 30_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_bounds_are_consistent() {
        assert!(MIN_UID_HEX_LENGTH < MAX_UID_HEX_LENGTH);
        assert_eq!(MIN_UID_HEX_LENGTH % 2, 0);
        assert_eq!(MAX_UID_HEX_LENGTH % 2, 0);
    }

    #[test]
    fn test_diagnostic_keywords_are_lowercase() {
        for keyword in DEFAULT_DIAGNOSTIC_KEYWORDS {
            assert_eq!(*keyword, keyword.to_lowercase());
        }
    }

    #[test]
    fn test_backoff_bounds() {
        assert!(RECONNECT_BACKOFF_INITIAL_MS <= RECONNECT_BACKOFF_MAX_MS);
    }
}
