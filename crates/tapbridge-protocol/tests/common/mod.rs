//! Common test utilities for protocol integration tests.
//!
//! Helpers here build canonical UIDs and decode published payloads back into
//! `serde_json::Value` so assertions read like the wire contract.

#![allow(dead_code)]

use serde_json::Value;
use tapbridge_core::Uid;
use tapbridge_protocol::{OutboundMessage, ScanFrame};

/// Primary test card.
pub const CARD_A: &str = "A1B2C3D4";

/// Secondary test card (7-byte UID).
pub const CARD_B: &str = "04A1B2C3D4E5F6";

pub fn uid(value: &str) -> Uid {
    Uid::new(value).expect("test UID must be valid")
}

pub fn uid_frame(value: &str) -> ScanFrame {
    ScanFrame::Uid(uid(value))
}

/// Decode a published JSON payload.
pub fn json(msg: &OutboundMessage) -> Value {
    serde_json::from_slice(&msg.payload).expect("payload must be JSON")
}
