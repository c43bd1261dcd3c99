//! Bridge engine: everything between a scanner line and a broker message.
//!
//! This crate holds the scanner-independent, broker-independent logic:
//! balance resolution with its cache, the presence state machine, the
//! publisher, top-up reconciliation, the heartbeat and the loop that drives
//! them. Transports and lookups plug in through the [`Transport`] and
//! [`BalanceLookup`] traits.

pub mod bridge;
pub mod cache;
pub mod health;
pub mod presence;
pub mod publisher;
pub mod reconcile;
pub mod resolver;

pub use bridge::{BridgeLoop, BridgeSettings, StepOutcome};
pub use cache::BalanceCache;
pub use health::{HealthConfig, HealthReporter};
pub use presence::{PresenceEvent, PresenceState, PresenceTracker};
pub use publisher::{Publisher, Transport, TransportError};
pub use reconcile::{ReconcileOutcome, ReconciliationHandler};
pub use resolver::{BalanceLookup, BalanceResolver, BalanceSource, LookupError, Resolution};
