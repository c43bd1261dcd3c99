//! MQTT transport and inbound session.
//!
//! [`connect`] splits the broker connection in two halves:
//!
//! - [`MqttTransport`]: a cloneable publishing handle implementing
//!   [`Transport`]. Publishing never waits on the network; messages are
//!   queued for the session to flush.
//! - [`MqttSession`]: owns the rumqttc event loop. It must be polled for
//!   anything to reach the broker, and it dispatches every inbound message to
//!   the [`ReconciliationHandler`].
//!
//! ```text
//!  BridgeLoop ──publish──┐
//!                        v
//!               MqttTransport ──queue──> MqttSession ──TCP──> broker
//!                        ^                    │
//!  ReconciliationHandler ┘<────── inbound ────┘
//! ```
//!
//! # Session Lifecycle
//!
//! On every `CONNACK` (first connect and each reconnect) the session
//! subscribes to the top-up topic, plus the team wildcard when sniffing is
//! enabled. After a reconnect it also re-announces `online`; the first
//! announcement comes from the bridge loop and is already queued. Connection errors are logged and the
//! next poll reconnects after an exponential backoff. The session ends when
//! [`MqttTransport::disconnect`] has been called and the `DISCONNECT` packet
//! has been flushed, or when every client handle is gone.
//!
//! The broker last will is the retained `offline` literal on the lifecycle
//! topic.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, EventLoop, LastWill, MqttOptions, Outgoing,
    Packet, QoS,
};
use tapbridge_core::{
    Backoff, LinkStatus,
    constants::{
        DEFAULT_BROKER_PORT, DEFAULT_KEEP_ALIVE_SECS, RECONNECT_BACKOFF_INITIAL_MS,
        RECONNECT_BACKOFF_MAX_MS, STATUS_OFFLINE,
    },
};
use tapbridge_engine::{ReconciliationHandler, Transport, TransportError};
use tapbridge_protocol::{OutboundMessage, Topics};
use tracing::{debug, info, warn};

/// Requests buffered between the handles and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// Errors raised while setting up or tearing down the broker connection.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("invalid MQTT configuration: {0}")]
    Config(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] ClientError),

    #[error("MQTT connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Also subscribe to `rfid/{team}/#` and log every message.
    pub sniff: bool,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl MqttConfig {
    /// Settings for `host` with defaults for everything else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_BROKER_PORT,
            client_id: default_client_id(),
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            sniff: false,
            backoff_initial: Duration::from_millis(RECONNECT_BACKOFF_INITIAL_MS),
            backoff_max: Duration::from_millis(RECONNECT_BACKOFF_MAX_MS),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_sniff(mut self, sniff: bool) -> Self {
        self.sniff = sniff;
        self
    }

    /// Check the settings rumqttc would otherwise reject by panicking.
    ///
    /// # Errors
    ///
    /// `MqttError::Config` for an empty host or client id, port 0, or a
    /// keep-alive shorter than one second.
    pub fn validate(&self) -> Result<(), MqttError> {
        if self.host.trim().is_empty() {
            return Err(MqttError::Config("broker host is empty".into()));
        }
        if self.port == 0 {
            return Err(MqttError::Config("broker port must be non-zero".into()));
        }
        if self.client_id.trim().is_empty() {
            return Err(MqttError::Config("client id is empty".into()));
        }
        if self.keep_alive < Duration::from_secs(1) {
            return Err(MqttError::Config(format!(
                "keep-alive must be at least 1s, got {:?}",
                self.keep_alive
            )));
        }
        Ok(())
    }

    /// rumqttc options, with the lifecycle last will registered.
    pub fn options(&self, topics: &Topics) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true)
            .set_last_will(LastWill::new(
                topics.device_status(),
                STATUS_OFFLINE,
                QoS::AtLeastOnce,
                true,
            ));
        options
    }
}

/// `tapbridge-<unix seconds>`, unique enough for one bridge per team.
pub fn default_client_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("tapbridge-{secs}")
}

/// Create the client halves. Nothing touches the network until the session
/// is polled.
///
/// # Errors
///
/// `MqttError::Config` if the settings are invalid.
pub fn connect(
    config: &MqttConfig,
    topics: &Topics,
) -> Result<(MqttTransport, MqttSession), MqttError> {
    config.validate()?;

    let (client, eventloop) = AsyncClient::new(config.options(topics), REQUEST_CAPACITY);
    let closing = Arc::new(AtomicBool::new(false));

    let transport = MqttTransport {
        client: client.clone(),
        closing: Arc::clone(&closing),
    };
    let session = MqttSession {
        eventloop,
        client,
        closing,
        topup_topic: topics.card_topup().to_string(),
        wildcard: config.sniff.then(|| topics.wildcard().to_string()),
        backoff: Backoff::new(config.backoff_initial, config.backoff_max),
        broker: format!("{}:{}", config.host, config.port),
        connections: 0,
    };
    Ok((transport, session))
}

/// Publishing handle.
#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    closing: Arc<AtomicBool>,
}

impl MqttTransport {
    /// Queue a `DISCONNECT` and let the session finish once it is flushed.
    ///
    /// Messages published before this call are sent first.
    ///
    /// # Errors
    ///
    /// `MqttError::Client` if the session is already gone.
    pub fn disconnect(&self) -> Result<(), MqttError> {
        self.closing.store(true, Ordering::SeqCst);
        self.client.try_disconnect()?;
        Ok(())
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

impl Transport for MqttTransport {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.client
            .try_publish(
                message.topic,
                QoS::AtMostOnce,
                message.retain,
                message.payload.to_vec(),
            )
            .map_err(|e| match e {
                ClientError::TryRequest(_) if self.is_closing() => {
                    TransportError::Disconnected(e.to_string())
                }
                other => TransportError::Rejected(other.to_string()),
            })
    }
}

/// Event loop half of the connection.
pub struct MqttSession {
    eventloop: EventLoop,
    client: AsyncClient,
    closing: Arc<AtomicBool>,
    topup_topic: String,
    wildcard: Option<String>,
    backoff: Backoff,
    broker: String,
    connections: u64,
}

impl MqttSession {
    /// Drive the connection until it is closed, dispatching inbound
    /// messages to `handler`.
    pub async fn run(mut self, handler: ReconciliationHandler<MqttTransport>) {
        info!(broker = %self.broker, "MQTT session started");

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connections += 1;
                    info!(
                        broker = %self.broker,
                        connection = self.connections,
                        "Connected to broker"
                    );
                    self.backoff.reset();
                    self.on_connected(&handler).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handler.handle(&publish.topic, &publish.payload).await;
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!(broker = %self.broker, "Disconnected from broker");
                    break;
                }
                Ok(_) => {}
                Err(ConnectionError::RequestsDone) => {
                    debug!("All MQTT handles dropped");
                    break;
                }
                Err(e) if self.closing.load(Ordering::SeqCst) => {
                    debug!(error = %e, "Connection error while closing");
                    break;
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    warn!(
                        broker = %self.broker,
                        error = %e,
                        attempt = self.backoff.attempts(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Broker connection lost"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn on_connected(&mut self, handler: &ReconciliationHandler<MqttTransport>) {
        let mut filters = vec![self.topup_topic.as_str()];
        if let Some(wildcard) = &self.wildcard {
            filters.push(wildcard.as_str());
        }

        for filter in filters {
            match self.client.try_subscribe(filter, QoS::AtMostOnce) {
                Ok(()) => debug!(filter, "Subscribed"),
                Err(e) => warn!(filter, error = %e, "Subscribe failed"),
            }
        }

        if self.connections > 1 {
            handler.publisher().announce(LinkStatus::Online).await;
        }
    }
}
