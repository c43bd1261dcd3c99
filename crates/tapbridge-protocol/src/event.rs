//! Domain events published by the bridge and their JSON payloads.
//!
//! Each variant of [`TopicEvent`] maps to exactly one topic. Payload field
//! names are the wire contract with downstream consumers; optional fields
//! are omitted rather than sent as `null`.
//!
//! ```text
//! card/status    {"uid":"A1B2C3D4","balance":50.0,"status":"detected","ts":1700000000}
//! card/status    {"uid":"A1B2C3D4","status":"removed","ts":1700000002}
//! card/balance   {"uid":"A1B2C3D4","new_balance":70.0,"amount":20.0,"status":"success","ts":1700000005}
//! device/health  {"status":"online","ip":"192.168.1.20","rssi":-50,"free_heap":40000,"ts":1700000060}
//! ```

use serde::{Deserialize, Serialize};
use tapbridge_core::{CardStatus, Uid, UnixTimestamp, constants::TOPUP_SUCCESS};

/// Presence transition on `card/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardStatusPayload {
    pub uid: Uid,

    /// Present on `detected` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,

    pub status: CardStatus,
    pub ts: UnixTimestamp,
}

/// Top-up confirmation on `card/balance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdatePayload {
    pub uid: Uid,
    pub new_balance: f64,

    /// Echoed only when the command carried an amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    pub status: String,
    pub ts: UnixTimestamp,
}

/// Heartbeat on `device/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,

    pub ip: String,
    pub rssi: i32,
    pub free_heap: u64,
    pub ts: UnixTimestamp,
}

/// Event published by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicEvent {
    CardStatus(CardStatusPayload),
    BalanceUpdate(BalanceUpdatePayload),
    Health(HealthPayload),
}

impl TopicEvent {
    /// Card arrival with its resolved balance.
    pub fn detected(uid: Uid, balance: f64, ts: UnixTimestamp) -> Self {
        TopicEvent::CardStatus(CardStatusPayload {
            uid,
            balance: Some(balance),
            status: CardStatus::Detected,
            ts,
        })
    }

    /// Card removal. Carries no balance.
    pub fn removed(uid: Uid, ts: UnixTimestamp) -> Self {
        TopicEvent::CardStatus(CardStatusPayload {
            uid,
            balance: None,
            status: CardStatus::Removed,
            ts,
        })
    }

    /// Successful top-up confirmation.
    pub fn balance_update(
        uid: Uid,
        new_balance: f64,
        amount: Option<f64>,
        ts: UnixTimestamp,
    ) -> Self {
        TopicEvent::BalanceUpdate(BalanceUpdatePayload {
            uid,
            new_balance,
            amount,
            status: TOPUP_SUCCESS.to_string(),
            ts,
        })
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            TopicEvent::CardStatus(p) => p.status.as_str(),
            TopicEvent::BalanceUpdate(_) => "balance_update",
            TopicEvent::Health(_) => "health",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn uid() -> Uid {
        Uid::new("A1B2C3D4").unwrap()
    }

    fn ts() -> UnixTimestamp {
        UnixTimestamp::from_secs(1_700_000_000)
    }

    fn to_value<T: Serialize>(payload: &T) -> Value {
        serde_json::to_value(payload).unwrap()
    }

    #[test]
    fn test_detected_payload() {
        let TopicEvent::CardStatus(payload) = TopicEvent::detected(uid(), 50.0, ts()) else {
            panic!("expected card status");
        };

        assert_eq!(
            to_value(&payload),
            json!({"uid": "A1B2C3D4", "balance": 50.0, "status": "detected", "ts": 1_700_000_000})
        );
    }

    #[test]
    fn test_removed_payload_has_no_balance() {
        let TopicEvent::CardStatus(payload) = TopicEvent::removed(uid(), ts()) else {
            panic!("expected card status");
        };

        let value = to_value(&payload);
        assert!(value.get("balance").is_none());
        assert_eq!(value["status"], "removed");
    }

    #[test]
    fn test_balance_update_payload() {
        let TopicEvent::BalanceUpdate(payload) =
            TopicEvent::balance_update(uid(), 70.0, Some(20.0), ts())
        else {
            panic!("expected balance update");
        };

        assert_eq!(
            to_value(&payload),
            json!({
                "uid": "A1B2C3D4",
                "new_balance": 70.0,
                "amount": 20.0,
                "status": "success",
                "ts": 1_700_000_000
            })
        );
    }

    #[test]
    fn test_balance_update_without_amount() {
        let TopicEvent::BalanceUpdate(payload) =
            TopicEvent::balance_update(uid(), 100.0, None, ts())
        else {
            panic!("expected balance update");
        };

        assert!(to_value(&payload).get("amount").is_none());
    }

    #[test]
    fn test_health_payload_optional_ssid() {
        let mut payload = HealthPayload {
            status: "online".to_string(),
            ssid: None,
            ip: "10.0.0.2".to_string(),
            rssi: -50,
            free_heap: 40_000,
            ts: ts(),
        };
        assert!(to_value(&payload).get("ssid").is_none());

        payload.ssid = Some("venue-net".to_string());
        let value = to_value(&payload);
        assert_eq!(value["ssid"], "venue-net");
        assert_eq!(value["rssi"], -50);
        assert_eq!(value["free_heap"], 40_000);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(TopicEvent::detected(uid(), 1.0, ts()).kind(), "detected");
        assert_eq!(TopicEvent::removed(uid(), ts()).kind(), "removed");
        assert_eq!(
            TopicEvent::balance_update(uid(), 1.0, None, ts()).kind(),
            "balance_update"
        );
    }
}
