//! Shared in-memory balance cache.
//!
//! The cache is the only state touched by both the bridge loop (balance
//! resolution) and the inbound delivery task (top-ups). It is an explicitly
//! owned handle: cloning a [`BalanceCache`] shares the same map.
//!
//! # Locking
//!
//! The map sits behind a `std::sync::Mutex`. Every method locks, does its
//! work, and unlocks before returning; the lock is never held across an
//! `.await`. A poisoned lock is recovered rather than propagated, since a
//! panic elsewhere cannot leave a `HashMap<Uid, Card>` half-written in a way
//! that matters to the bridge.
//!
//! # Examples
//!
//! ```
//! use tapbridge_core::Uid;
//! use tapbridge_engine::BalanceCache;
//!
//! let cache = BalanceCache::new();
//! let loop_side = cache.clone();
//!
//! let uid = Uid::new("A1B2C3D4").unwrap();
//! loop_side.store(&uid, 50.0);
//!
//! assert_eq!(cache.balance(&uid), Some(50.0));
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tapbridge_core::{Card, Uid};

/// Cloneable handle to the shared balance map.
#[derive(Debug, Clone, Default)]
pub struct BalanceCache {
    inner: Arc<Mutex<HashMap<Uid, Card>>>,
}

impl BalanceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached balance for `uid`, if any.
    pub fn balance(&self, uid: &Uid) -> Option<f64> {
        self.lock().get(uid).map(|card| card.balance)
    }

    /// Full cached entry for `uid`, if any.
    pub fn get(&self, uid: &Uid) -> Option<Card> {
        self.lock().get(uid).cloned()
    }

    /// Insert or replace the balance for `uid`, stamping the entry now.
    ///
    /// Returns the previous balance.
    pub fn store(&self, uid: &Uid, balance: f64) -> Option<f64> {
        self.lock()
            .insert(uid.clone(), Card::new(uid.clone(), balance))
            .map(|previous| previous.balance)
    }

    /// Cached balance for `uid`, or `default` stored under the same lock.
    ///
    /// Returns the balance and whether it was already cached. An existing
    /// entry is left as it is.
    pub fn get_or_store(&self, uid: &Uid, default: f64) -> (f64, bool) {
        let mut map = self.lock();
        let mut cached = true;
        let card = map.entry(uid.clone()).or_insert_with(|| {
            cached = false;
            Card::new(uid.clone(), default)
        });
        (card.balance, cached)
    }

    /// Read-modify-write under a single lock.
    ///
    /// `update` receives the current balance (if cached) and returns the new
    /// one, or an error that leaves the entry untouched. Used by top-ups so
    /// a concurrent resolution cannot slip between the read and the write.
    pub fn update<E>(
        &self,
        uid: &Uid,
        update: impl FnOnce(Option<f64>) -> Result<f64, E>,
    ) -> Result<f64, E> {
        let mut map = self.lock();
        let current = map.get(uid).map(|card| card.balance);
        let next = update(current)?;
        map.insert(uid.clone(), Card::new(uid.clone(), next));
        Ok(next)
    }

    /// Number of cached cards.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no card has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uid, Card>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
