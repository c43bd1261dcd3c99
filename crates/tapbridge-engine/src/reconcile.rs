//! Top-up reconciliation.
//!
//! Runs on the inbound delivery task, never on the bridge loop. Every
//! message delivered by the broker passes through
//! [`ReconciliationHandler::handle`]; only the team's top-up topic is acted
//! upon, everything else is sniffed into the debug log.

use tapbridge_core::{Uid, UnixTimestamp};
use tapbridge_protocol::{TopUpCommand, TopicEvent};
use tracing::{debug, info, warn};

use crate::{
    cache::BalanceCache,
    publisher::{Publisher, Transport},
};

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Cache updated and confirmation published.
    Applied { uid: Uid, new_balance: f64 },

    /// Top-up topic, but not a command (no uid, no amount, not JSON).
    Ignored,

    /// Looked like a command but could not be applied.
    Rejected(String),

    /// Some other topic of the namespace.
    NotTopUp,
}

/// Applies top-up commands to the shared cache.
#[derive(Debug, Clone)]
pub struct ReconciliationHandler<T> {
    cache: BalanceCache,
    publisher: Publisher<T>,
}

impl<T: Transport> ReconciliationHandler<T> {
    pub fn new(cache: BalanceCache, publisher: Publisher<T>) -> Self {
        Self { cache, publisher }
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    pub fn publisher(&self) -> &Publisher<T> {
        &self.publisher
    }

    /// Handle one inbound message. Errors are logged here and never leave
    /// this function.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> ReconcileOutcome {
        if !self.publisher.topics().is_topup(topic) {
            debug!(
                topic,
                payload = %String::from_utf8_lossy(payload),
                "Sniffed message"
            );
            return ReconcileOutcome::NotTopUp;
        }

        let command = match TopUpCommand::parse(payload) {
            Ok(Some(command)) => command,
            Ok(None) => {
                debug!(topic, "Top-up message is not a command, ignored");
                return ReconcileOutcome::Ignored;
            }
            Err(e) => {
                warn!(topic, error = %e, "Malformed top-up command");
                return ReconcileOutcome::Rejected(e.to_string());
            }
        };

        let new_balance = match self.cache.update(&command.uid, |current| command.apply(current)) {
            Ok(balance) => balance,
            Err(e) => {
                warn!(uid = %command.uid, error = %e, "Top-up rejected");
                return ReconcileOutcome::Rejected(e.to_string());
            }
        };

        info!(
            uid = %command.uid,
            amount = ?command.amount,
            new_balance,
            "Top-up applied"
        );

        let event = TopicEvent::balance_update(
            command.uid.clone(),
            new_balance,
            command.amount,
            UnixTimestamp::now(),
        );
        self.publisher.publish(&event).await;

        ReconcileOutcome::Applied {
            uid: command.uid,
            new_balance,
        }
    }
}
