//! Topic publisher.
//!
//! Serializes [`TopicEvent`]s through [`Topics`] and hands the resulting
//! [`OutboundMessage`]s to a [`Transport`]. Publishing is fire-and-forget:
//! a failure is logged and reported as `false`, never as an error, so
//! neither the bridge loop nor the inbound task can be stopped by a broker
//! hiccup.

#![allow(async_fn_in_trait)]

use std::sync::Arc;

use tapbridge_core::LinkStatus;
use tapbridge_protocol::{OutboundMessage, TopicEvent, Topics};
use tracing::{debug, warn};

/// Failure to hand a message to the broker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection is gone or the client was shut down.
    #[error("transport disconnected: {0}")]
    Disconnected(String),

    /// The client refused the message (queue full, invalid topic).
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Outbound side of the broker connection.
///
/// Implemented by the MQTT client in `tapbridge-network`, and by recording
/// fakes in tests.
pub trait Transport {
    /// Queue `message` for delivery.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`]; the publisher logs it.
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// Event publisher shared by the bridge loop and the inbound task.
///
/// Cheap to clone when `T` is.
#[derive(Debug, Clone)]
pub struct Publisher<T> {
    transport: T,
    topics: Arc<Topics>,
}

impl<T: Transport> Publisher<T> {
    /// Create a publisher for one team namespace.
    pub fn new(transport: T, topics: Topics) -> Self {
        Self {
            transport,
            topics: Arc::new(topics),
        }
    }

    /// Topic set this publisher writes to.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Publish a domain event. Returns `true` if the transport accepted it.
    pub async fn publish(&self, event: &TopicEvent) -> bool {
        let message = match self.topics.route(event) {
            Ok(message) => message,
            Err(e) => {
                warn!(event = event.kind(), error = %e, "Cannot encode event");
                return false;
            }
        };

        self.send(message, event.kind()).await
    }

    /// Publish the retained lifecycle literal.
    pub async fn announce(&self, status: LinkStatus) -> bool {
        let message = self.topics.lifecycle(status);
        self.send(message, status.as_str()).await
    }

    async fn send(&self, message: OutboundMessage, kind: &str) -> bool {
        let topic = message.topic.clone();
        match self.transport.send(message).await {
            Ok(()) => {
                debug!(topic = %topic, kind, "Published");
                true
            }
            Err(e) => {
                warn!(topic = %topic, kind, error = %e, "Publish failed");
                false
            }
        }
    }
}
