//! Network side of the tapbridge bridge.
//!
//! - [`mqtt`]: the broker connection, split into a publishing
//!   [`MqttTransport`] and an [`MqttSession`] that drives the event loop and
//!   feeds inbound top-ups to the reconciliation handler.
//! - [`http`]: [`HttpLookup`], a balance backend queried over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tapbridge_engine::{BalanceCache, BalanceResolver, Publisher, ReconciliationHandler};
//! use tapbridge_network::{HttpLookup, MqttConfig};
//! use tapbridge_protocol::Topics;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let topics = Topics::new("team_a")?;
//! let (transport, session) = tapbridge_network::connect(&MqttConfig::new("localhost"), &topics)?;
//!
//! let cache = BalanceCache::new();
//! let publisher = Publisher::new(transport.clone(), topics);
//! tokio::spawn(session.run(ReconciliationHandler::new(cache.clone(), publisher.clone())));
//!
//! let backend = HttpLookup::new(
//!     "local",
//!     "http://localhost:8080/card/{uid}",
//!     Duration::from_secs(2),
//! )?;
//! let resolver = BalanceResolver::new(vec![backend], cache);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod mqtt;

pub use http::HttpLookup;
pub use mqtt::{MqttConfig, MqttError, MqttSession, MqttTransport, connect};
