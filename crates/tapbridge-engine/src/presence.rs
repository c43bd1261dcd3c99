//! Card presence state machine.
//!
//! The scanner reports a UID every time it sees a tag, and nothing when the
//! tag leaves. This module turns that stream of observations into discrete
//! arrival and removal events.
//!
//! # States
//!
//! - `Absent`: no card in the field.
//! - `Present`: a card was seen within the silence timeout.
//!
//! # Transitions
//!
//! ```text
//!              arrive(A)                 arrive(B)
//!  ┌────────┐ ─────────────> ┌────────────┐ ──────────> ┌────────────┐
//!  │ Absent │   detected(A)  │ Present(A) │ removed(A)  │ Present(B) │
//!  └────────┘ <───────────── └────────────┘ detected(B) └────────────┘
//!               silence > timeout   │  ^
//!               removed(A)          └──┘ arrive(A) / refresh(A): nothing emitted
//! ```
//!
//! The tracker never reads the clock itself; every method takes `now`, so
//! the bridge can drive it from Tokio's (pausable) clock and tests can drive
//! it by hand.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use tapbridge_core::Uid;
//! use tapbridge_engine::{PresenceEvent, PresenceTracker};
//!
//! let mut tracker = PresenceTracker::new(Duration::from_secs(2));
//! let uid = Uid::new("A1B2C3D4").unwrap();
//! let t0 = Instant::now();
//!
//! let events = tracker.arrive(uid.clone(), 50.0, t0);
//! assert_eq!(events, vec![PresenceEvent::Detected { uid: uid.clone(), balance: 50.0 }]);
//!
//! // Same card again: nothing new
//! assert!(tracker.refresh(&uid, t0 + Duration::from_secs(1)));
//!
//! // 2.1 s of silence after the last read
//! let removed = tracker.check_timeout(t0 + Duration::from_millis(3100));
//! assert_eq!(removed, Some(PresenceEvent::Removed { uid }));
//! ```

use std::time::{Duration, Instant};

use tapbridge_core::{CardStatus, Uid};

/// Presence state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceState {
    /// No card in the field.
    Absent,

    /// A card is in the field.
    Present { uid: Uid, last_seen_at: Instant },
}

/// Transition emitted by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// A card arrived, with the balance resolved for it.
    Detected { uid: Uid, balance: f64 },

    /// The present card left (or was replaced).
    Removed { uid: Uid },
}

impl PresenceEvent {
    /// UID the event is about.
    pub fn uid(&self) -> &Uid {
        match self {
            PresenceEvent::Detected { uid, .. } | PresenceEvent::Removed { uid } => uid,
        }
    }

    /// Wire status for this event.
    pub fn status(&self) -> CardStatus {
        match self {
            PresenceEvent::Detected { .. } => CardStatus::Detected,
            PresenceEvent::Removed { .. } => CardStatus::Removed,
        }
    }
}

/// Single-card presence tracker.
///
/// At most one card is present at a time.
#[derive(Debug)]
pub struct PresenceTracker {
    state: PresenceState,
    timeout: Duration,
}

impl PresenceTracker {
    /// Create a tracker in the `Absent` state.
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: PresenceState::Absent,
            timeout,
        }
    }

    /// Current state.
    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    /// Silence timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// UID of the present card, if any.
    pub fn current_uid(&self) -> Option<&Uid> {
        match &self.state {
            PresenceState::Present { uid, .. } => Some(uid),
            PresenceState::Absent => None,
        }
    }

    /// When the present card was last seen.
    pub fn last_seen_at(&self) -> Option<Instant> {
        match &self.state {
            PresenceState::Present { last_seen_at, .. } => Some(*last_seen_at),
            PresenceState::Absent => None,
        }
    }

    /// Returns `true` if a card is present.
    pub fn is_present(&self) -> bool {
        matches!(self.state, PresenceState::Present { .. })
    }

    /// Returns `true` if `uid` is the present card.
    ///
    /// A read of the present card produces no event, so callers use this to
    /// skip balance resolution.
    pub fn is_current(&self, uid: &Uid) -> bool {
        self.current_uid() == Some(uid)
    }

    /// Record another read of the present card.
    ///
    /// Returns `false` (and changes nothing) if `uid` is not the present
    /// card; the caller should then resolve a balance and call
    /// [`arrive`](Self::arrive).
    pub fn refresh(&mut self, uid: &Uid, now: Instant) -> bool {
        match &mut self.state {
            PresenceState::Present {
                uid: current,
                last_seen_at,
            } if current == uid => {
                *last_seen_at = now;
                true
            }
            _ => false,
        }
    }

    /// Record a read of `uid` with its resolved balance.
    ///
    /// - Nothing present: `[Detected(uid)]`.
    /// - Another card present: `[Removed(old), Detected(uid)]`, in that order.
    /// - Same card present: refreshes `last_seen_at`, returns no events.
    pub fn arrive(&mut self, uid: Uid, balance: f64, now: Instant) -> Vec<PresenceEvent> {
        if self.refresh(&uid, now) {
            return Vec::new();
        }

        let previous = std::mem::replace(
            &mut self.state,
            PresenceState::Present {
                uid: uid.clone(),
                last_seen_at: now,
            },
        );

        let mut events = Vec::with_capacity(2);
        if let PresenceState::Present { uid: old, .. } = previous {
            events.push(PresenceEvent::Removed { uid: old });
        }
        events.push(PresenceEvent::Detected { uid, balance });
        events
    }

    /// Expire the present card if it has been silent for longer than the
    /// timeout.
    ///
    /// Returns the removal at most once per presence.
    pub fn check_timeout(&mut self, now: Instant) -> Option<PresenceEvent> {
        let expired = match &self.state {
            PresenceState::Present { last_seen_at, .. } => {
                now.saturating_duration_since(*last_seen_at) > self.timeout
            }
            PresenceState::Absent => false,
        };

        if !expired {
            return None;
        }

        match std::mem::replace(&mut self.state, PresenceState::Absent) {
            PresenceState::Present { uid, .. } => Some(PresenceEvent::Removed { uid }),
            PresenceState::Absent => None,
        }
    }
}
