//! The bridge loop.
//!
//! One task owns the line source, the presence tracker and the resolver, and
//! runs [`BridgeLoop::step`] until shutdown. Every step is bounded: the
//! source is polled with a short timeout so the heartbeat and the presence
//! timeout are evaluated even when the scanner is silent.
//!
//! ```text
//! ┌──────────────────────────── step ────────────────────────────┐
//! │ health due?      ──yes──> publish device/health              │
//! │ card silent?     ──yes──> publish card/status removed        │
//! │ poll source ──line──> classify                               │
//! │                         ├─ Uid ──> refresh, or resolve +     │
//! │                         │          arrive + publish; debounce│
//! │                         ├─ Log ──> info log                  │
//! │                         └─ Noise                             │
//! │ idle delay                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All timing reads Tokio's clock, so paused-time tests drive the loop
//! deterministically.

use std::{future::Future, time::Duration};

use tapbridge_core::{
    LinkStatus, Uid, UnixTimestamp,
    constants::{
        DEFAULT_DEBOUNCE_MS, DEFAULT_HEALTH_INTERVAL_SECS, DEFAULT_IDLE_DELAY_MS,
        DEFAULT_PRESENCE_TIMEOUT_MS, DEFAULT_SERIAL_POLL_MS,
    },
};
use tapbridge_hardware::LineSource;
use tapbridge_protocol::{FrameExtractor, ScanFrame, TopicEvent};
use tracing::{debug, info, trace, warn};

use crate::{
    health::HealthReporter,
    presence::{PresenceEvent, PresenceTracker},
    publisher::{Publisher, Transport},
    resolver::{BalanceLookup, BalanceResolver},
};

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    pub health_interval: Duration,
    pub presence_timeout: Duration,
    /// Pause after each processed card read.
    pub debounce: Duration,
    /// Pause at the end of every iteration.
    pub idle_delay: Duration,
    /// Longest wait for a line in one iteration.
    pub poll_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(DEFAULT_HEALTH_INTERVAL_SECS),
            presence_timeout: Duration::from_millis(DEFAULT_PRESENCE_TIMEOUT_MS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            idle_delay: Duration::from_millis(DEFAULT_IDLE_DELAY_MS),
            poll_timeout: Duration::from_millis(DEFAULT_SERIAL_POLL_MS),
        }
    }
}

/// What one iteration did with its input.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No line within the poll timeout.
    Idle,

    /// A card read. `detected` is `false` for a repeat of the present card.
    Card { uid: Uid, detected: bool },

    /// Firmware diagnostic output.
    Log,

    /// Nothing usable on the line.
    Noise,

    /// Transient source failure.
    SourceError,

    /// The source ended; only timers still run.
    SourceDone,
}

/// Orchestrates extraction, resolution, presence and publishing.
pub struct BridgeLoop<S, L, T> {
    source: S,
    extractor: FrameExtractor,
    resolver: BalanceResolver<L>,
    tracker: PresenceTracker,
    publisher: Publisher<T>,
    health: HealthReporter,
    settings: BridgeSettings,
    last_health: Option<std::time::Instant>,
    source_done: bool,
}

impl<S, L, T> BridgeLoop<S, L, T>
where
    S: LineSource,
    L: BalanceLookup,
    T: Transport,
{
    pub fn new(
        source: S,
        resolver: BalanceResolver<L>,
        publisher: Publisher<T>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            source,
            extractor: FrameExtractor::default(),
            resolver,
            tracker: PresenceTracker::new(settings.presence_timeout),
            publisher,
            health: HealthReporter::default(),
            settings,
            last_health: None,
            source_done: false,
        }
    }

    /// Use a custom diagnostic keyword list.
    pub fn with_extractor(mut self, extractor: FrameExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_health(mut self, health: HealthReporter) -> Self {
        self.health = health;
        self
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn resolver(&self) -> &BalanceResolver<L> {
        &self.resolver
    }

    pub fn publisher(&self) -> &Publisher<T> {
        &self.publisher
    }

    /// Announce `online`, step until `shutdown` resolves, then announce
    /// `offline`.
    ///
    /// An in-flight step is abandoned at shutdown; sources are cancel-safe.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        info!(source = self.source.name(), "Bridge loop started");
        self.publisher.announce(LinkStatus::Online).await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = self.step() => {}
            }
        }

        info!("Bridge loop stopping");
        self.publisher.announce(LinkStatus::Offline).await;
    }

    /// Run one iteration.
    pub async fn step(&mut self) -> StepOutcome {
        let now = clock();

        if self.health_due(now) {
            self.last_health = Some(now);
            let heartbeat = self.health.snapshot().await;
            self.publisher.publish(&heartbeat).await;
        }

        if let Some(removed) = self.tracker.check_timeout(now) {
            info!(uid = %removed.uid(), "Card removed");
            self.publish_presence(removed).await;
        }

        let outcome = self.poll_source().await;
        tokio::time::sleep(self.settings.idle_delay).await;
        outcome
    }

    fn health_due(&self, now: std::time::Instant) -> bool {
        match self.last_health {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.settings.health_interval,
        }
    }

    async fn poll_source(&mut self) -> StepOutcome {
        if self.source_done {
            return StepOutcome::SourceDone;
        }

        let line = match self.source.next_line(self.settings.poll_timeout).await {
            Ok(Some(line)) => line,
            Ok(None) => return StepOutcome::Idle,
            Err(e) if e.is_terminal() => {
                warn!(source = self.source.name(), error = %e, "Line source finished");
                self.source_done = true;
                return StepOutcome::SourceDone;
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Line source error");
                return StepOutcome::SourceError;
            }
        };

        match self.extractor.classify(line.as_bytes()) {
            ScanFrame::Uid(uid) => {
                let detected = self.process_uid(uid.clone()).await;
                tokio::time::sleep(self.settings.debounce).await;
                StepOutcome::Card { uid, detected }
            }
            ScanFrame::Log(text) => {
                info!(source = self.source.name(), line = %text, "Scanner log");
                StepOutcome::Log
            }
            ScanFrame::Noise => {
                trace!(source = self.source.name(), len = line.len(), "Noise dropped");
                StepOutcome::Noise
            }
        }
    }

    /// Returns `true` if the read produced a detection.
    async fn process_uid(&mut self, uid: Uid) -> bool {
        if self.tracker.refresh(&uid, clock()) {
            trace!(uid = %uid, "Card still present");
            return false;
        }

        let resolution = self.resolver.resolve(&uid).await;
        info!(
            uid = %uid,
            balance = resolution.balance,
            source = %resolution.source,
            "Card detected"
        );

        for event in self.tracker.arrive(uid, resolution.balance, clock()) {
            self.publish_presence(event).await;
        }
        true
    }

    async fn publish_presence(&self, event: PresenceEvent) {
        let ts = UnixTimestamp::now();
        let event = match event {
            PresenceEvent::Detected { uid, balance } => TopicEvent::detected(uid, balance, ts),
            PresenceEvent::Removed { uid } => TopicEvent::removed(uid, ts),
        };
        if !self.publisher.publish(&event).await {
            debug!(event = event.kind(), "Presence event not delivered");
        }
    }
}

fn clock() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::BalanceCache, publisher::TransportError, resolver::LookupError};
    use std::sync::{Arc, Mutex};
    use tapbridge_hardware::mock::{MockScanner, MockScannerHandle};
    use tapbridge_protocol::{OutboundMessage, Topics};

    #[derive(Debug, Default, Clone)]
    struct Recorder {
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
    }

    impl Recorder {
        fn topics(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.topic.clone()).collect()
        }
    }

    impl Transport for Recorder {
        async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Down;

    impl BalanceLookup for Down {
        async fn fetch(&self, _uid: &Uid) -> Result<f64, LookupError> {
            Err(LookupError::unreachable("backend", "connection refused"))
        }

        fn name(&self) -> &str {
            "backend"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(2)
        }
    }

    fn bridge() -> (BridgeLoop<MockScanner, Down, Recorder>, MockScannerHandle, Recorder) {
        let (scanner, handle) = MockScanner::new();
        let recorder = Recorder::default();
        let publisher = Publisher::new(recorder.clone(), Topics::new("team_a").unwrap());
        let resolver = BalanceResolver::new(vec![Down], BalanceCache::new());
        let bridge = BridgeLoop::new(scanner, resolver, publisher, BridgeSettings::default());
        (bridge, handle, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_step_sends_heartbeat() {
        let (mut bridge, _handle, recorder) = bridge();

        assert_eq!(bridge.step().await, StepOutcome::Idle);
        assert_eq!(recorder.topics(), vec!["rfid/team_a/device/health"]);

        // Not due again before the interval
        bridge.step().await;
        assert_eq!(recorder.topics().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_repeats_after_interval() {
        let (mut bridge, _handle, recorder) = bridge();

        bridge.step().await;
        tokio::time::advance(Duration::from_secs(61)).await;
        bridge.step().await;

        let health = recorder
            .topics()
            .into_iter()
            .filter(|t| t.ends_with("device/health"))
            .count();
        assert_eq!(health, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_reads_detect_once() {
        let (mut bridge, handle, recorder) = bridge();
        handle.send_line("A1B2C3D4").await.unwrap();
        handle.send_line("a1b2c3d4").await.unwrap();

        let uid = Uid::new("A1B2C3D4").unwrap();
        assert_eq!(
            bridge.step().await,
            StepOutcome::Card {
                uid: uid.clone(),
                detected: true
            }
        );
        assert_eq!(
            bridge.step().await,
            StepOutcome::Card {
                uid,
                detected: false
            }
        );

        let status = recorder
            .topics()
            .into_iter()
            .filter(|t| t.ends_with("card/status"))
            .count();
        assert_eq!(status, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnostic_line_is_not_a_card() {
        let (mut bridge, handle, _recorder) = bridge();
        handle.send_line("wifi connecting DEADBEEF").await.unwrap();
        handle.send_bytes(vec![0xFF, 0xFE]).await.unwrap();

        assert_eq!(bridge.step().await, StepOutcome::Log);
        assert_eq!(bridge.step().await, StepOutcome::Noise);
        assert!(!bridge.tracker().is_present());
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_done_keeps_timers_running() {
        let (mut bridge, handle, recorder) = bridge();
        handle.send_line("A1B2C3D4").await.unwrap();
        drop(handle);

        assert!(matches!(bridge.step().await, StepOutcome::Card { .. }));
        assert_eq!(bridge.step().await, StepOutcome::SourceDone);

        for _ in 0..30 {
            bridge.step().await;
        }

        assert!(!bridge.tracker().is_present());
        assert!(
            recorder
                .sent
                .lock()
                .unwrap()
                .iter()
                .any(|m| m.payload_text().contains("removed"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_announces_lifecycle() {
        let (mut bridge, _handle, recorder) = bridge();

        bridge
            .run(tokio::time::sleep(Duration::from_millis(350)))
            .await;

        let sent = recorder.sent.lock().unwrap().clone();
        let first = sent.first().unwrap();
        let last = sent.last().unwrap();
        assert_eq!(first.payload_text(), "online");
        assert_eq!(last.payload_text(), "offline");
        assert!(first.retain && last.retain);
    }
}
