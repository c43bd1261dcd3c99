//! Balance resolution through an ordered chain of lookups.
//!
//! # Fallback Chain
//!
//! ```text
//! lookup[0] ──fail──> lookup[1] ──fail──> ... ──fail──> cache ──miss──> default
//!     │ ok                │ ok                            │ hit            │
//!     v                   v                               v                v
//!  Remote(name)       Remote(name)                      Cache           Default
//! ```
//!
//! The first lookup that answers with a finite, non-negative balance wins.
//! Every failure is logged and the chain advances; nothing propagates to the
//! caller. Whatever the source, the resolved balance is written to the
//! [`BalanceCache`] before [`BalanceResolver::resolve`] returns.

#![allow(async_fn_in_trait)]

use std::{fmt, time::Duration};

use tapbridge_core::{Uid, constants::DEFAULT_BALANCE, validate_balance};
use tracing::{debug, info, warn};

use crate::cache::BalanceCache;

/// Failure of a single lookup. Never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    /// No answer within the endpoint timeout.
    #[error("{endpoint}: timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Connection refused, DNS failure and similar.
    #[error("{endpoint}: unreachable: {message}")]
    Unreachable { endpoint: String, message: String },

    /// Non-success HTTP status.
    #[error("{endpoint}: unexpected status {status}")]
    Status { endpoint: String, status: u16 },

    /// Body is not JSON or lacks a numeric `balance`.
    #[error("{endpoint}: malformed response: {message}")]
    Malformed { endpoint: String, message: String },
}

impl LookupError {
    /// Create a new malformed response error.
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a new unreachable error.
    pub fn unreachable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// One remote balance lookup strategy.
///
/// Implemented by the HTTP backend client in `tapbridge-network`, and by
/// scripted fakes in tests.
pub trait BalanceLookup {
    /// Fetch the authoritative balance for `uid`.
    ///
    /// # Errors
    ///
    /// Any [`LookupError`]; the resolver logs it and moves on.
    async fn fetch(&self, uid: &Uid) -> Result<f64, LookupError>;

    /// Endpoint name for logs and [`BalanceSource::Remote`].
    fn name(&self) -> &str;

    /// Upper bound for a single `fetch`.
    fn timeout(&self) -> Duration;
}

/// Where a resolved balance came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceSource {
    /// Named remote lookup.
    Remote(String),

    /// Previously cached value.
    Cache,

    /// Configured default for unknown cards.
    Default,
}

impl fmt::Display for BalanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceSource::Remote(name) => write!(f, "remote:{name}"),
            BalanceSource::Cache => f.write_str("cache"),
            BalanceSource::Default => f.write_str("default"),
        }
    }
}

/// Result of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub balance: f64,
    pub source: BalanceSource,
}

/// Ordered lookup chain with cache and default fallback.
#[derive(Debug)]
pub struct BalanceResolver<L> {
    lookups: Vec<L>,
    cache: BalanceCache,
    default_balance: f64,
}

impl<L: BalanceLookup> BalanceResolver<L> {
    /// Create a resolver over `lookups`, tried in order.
    pub fn new(lookups: Vec<L>, cache: BalanceCache) -> Self {
        Self {
            lookups,
            cache,
            default_balance: DEFAULT_BALANCE,
        }
    }

    /// Override the balance used for cards unknown everywhere.
    pub fn with_default_balance(mut self, default_balance: f64) -> Self {
        self.default_balance = default_balance;
        self
    }

    /// Shared cache handle.
    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    /// Number of configured lookups.
    pub fn lookup_count(&self) -> usize {
        self.lookups.len()
    }

    /// Resolve the balance for `uid`. Never fails.
    pub async fn resolve(&self, uid: &Uid) -> Resolution {
        match self.fetch_remote(uid).await {
            Some(resolution) => {
                self.cache.store(uid, resolution.balance);
                resolution
            }
            None => self.fallback(uid),
        }
    }

    async fn fetch_remote(&self, uid: &Uid) -> Option<Resolution> {
        for lookup in &self.lookups {
            match self.fetch_one(lookup, uid).await {
                Ok(balance) => {
                    debug!(uid = %uid, endpoint = lookup.name(), balance, "Balance fetched");
                    return Some(Resolution {
                        balance,
                        source: BalanceSource::Remote(lookup.name().to_string()),
                    });
                }
                Err(error) => {
                    warn!(
                        uid = %uid,
                        endpoint = lookup.name(),
                        error = %error,
                        "Balance lookup failed"
                    );
                }
            }
        }
        None
    }

    async fn fetch_one(&self, lookup: &L, uid: &Uid) -> Result<f64, LookupError> {
        let timeout = lookup.timeout();
        let balance = tokio::time::timeout(timeout, lookup.fetch(uid))
            .await
            .map_err(|_| LookupError::Timeout {
                endpoint: lookup.name().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        validate_balance(balance)
            .map_err(|e| LookupError::malformed(lookup.name(), e.to_string()))
    }

    // Read and default insert share one lock; a concurrent top-up is never reverted.
    fn fallback(&self, uid: &Uid) -> Resolution {
        let (balance, cached) = self.cache.get_or_store(uid, self.default_balance);
        let source = if cached {
            BalanceSource::Cache
        } else {
            BalanceSource::Default
        };
        let resolution = Resolution { balance, source };

        if !self.lookups.is_empty() {
            info!(
                uid = %uid,
                source = %resolution.source,
                balance = resolution.balance,
                "All balance lookups failed, using fallback"
            );
        }
        resolution
    }
}
