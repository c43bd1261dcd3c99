//! Broker-ready messages.
//!
//! [`OutboundMessage`] is the transport-agnostic unit handed to the publisher:
//! topic, payload bytes and the retain flag. It is built from a
//! [`TopicEvent`] or a lifecycle [`LinkStatus`] through [`Topics`].

use bytes::Bytes;
use serde::Serialize;
use tapbridge_core::{Error, LinkStatus, Result};

use crate::{Topics, event::TopicEvent};

/// Message ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain,
        }
    }

    /// Payload as text, lossily decoded. For logs and tests.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

impl Topics {
    /// Map an event to its topic and JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` if the payload cannot be serialized.
    pub fn route(&self, event: &TopicEvent) -> Result<OutboundMessage> {
        match event {
            TopicEvent::CardStatus(p) => json_message(self.card_status(), p),
            TopicEvent::BalanceUpdate(p) => json_message(self.card_balance(), p),
            TopicEvent::Health(p) => json_message(self.device_health(), p),
        }
    }

    /// Retained lifecycle message carrying the bare `online` / `offline`
    /// literal. The `offline` variant doubles as the broker last will.
    pub fn lifecycle(&self, status: LinkStatus) -> OutboundMessage {
        OutboundMessage::new(self.device_status(), status.as_str().as_bytes().to_vec(), true)
    }
}

fn json_message<T: Serialize>(topic: &str, payload: &T) -> Result<OutboundMessage> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|e| Error::InvalidPayload(format!("cannot serialize payload for {topic}: {e}")))?;
    Ok(OutboundMessage::new(topic, bytes, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tapbridge_core::{Uid, UnixTimestamp};

    fn topics() -> Topics {
        Topics::new("team_a").unwrap()
    }

    fn uid() -> Uid {
        Uid::new("A1B2C3D4").unwrap()
    }

    #[test]
    fn test_route_card_status() {
        let event = TopicEvent::detected(uid(), 50.0, UnixTimestamp::from_secs(10));
        let msg = topics().route(&event).unwrap();

        assert_eq!(msg.topic, "rfid/team_a/card/status");
        assert!(!msg.retain);

        let value: Value = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(value["uid"], "A1B2C3D4");
        assert_eq!(value["balance"], 50.0);
        assert_eq!(value["status"], "detected");
        assert_eq!(value["ts"], 10);
    }

    #[test]
    fn test_route_balance_update() {
        let event =
            TopicEvent::balance_update(uid(), 70.0, Some(20.0), UnixTimestamp::from_secs(10));
        let msg = topics().route(&event).unwrap();

        assert_eq!(msg.topic, "rfid/team_a/card/balance");
        assert!(msg.payload_text().contains("\"new_balance\":70.0"));
    }

    #[test]
    fn test_route_non_finite_balance_is_null() {
        let event = TopicEvent::detected(uid(), f64::NAN, UnixTimestamp::from_secs(10));
        // serde_json writes NaN as null, which is still valid JSON
        let msg = topics().route(&event).unwrap();
        assert!(msg.payload_text().contains("\"balance\":null"));
    }

    #[test]
    fn test_lifecycle_is_retained_literal() {
        let online = topics().lifecycle(LinkStatus::Online);
        assert_eq!(online.topic, "rfid/team_a/device/status");
        assert_eq!(online.payload_text(), "online");
        assert!(online.retain);

        let offline = topics().lifecycle(LinkStatus::Offline);
        assert_eq!(offline.payload_text(), "offline");
        assert!(offline.retain);
    }
}
