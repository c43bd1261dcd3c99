//! End-to-end flows through the bridge loop with a mock scanner, a
//! recording transport and an unreachable backend.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::Value;
use tapbridge_core::Uid;
use tapbridge_engine::{
    BalanceCache, BalanceLookup, BalanceResolver, BridgeLoop, BridgeSettings, LookupError,
    Publisher, ReconcileOutcome, ReconciliationHandler, StepOutcome, Transport, TransportError,
};
use tapbridge_hardware::mock::{MockScanner, MockScannerHandle};
use tapbridge_protocol::{OutboundMessage, Topics};

#[derive(Debug, Default, Clone)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingTransport {
    fn on(&self, topic: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| serde_json::from_slice(&m.payload).unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

struct Unreachable(&'static str);

impl BalanceLookup for Unreachable {
    async fn fetch(&self, _uid: &Uid) -> Result<f64, LookupError> {
        Err(LookupError::unreachable(self.0, "connection refused"))
    }

    fn name(&self) -> &str {
        self.0
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }
}

const STATUS: &str = "rfid/team_a/card/status";
const BALANCE: &str = "rfid/team_a/card/balance";
const TOPUP: &str = "rfid/team_a/card/topup";

struct Harness {
    bridge: BridgeLoop<MockScanner, Unreachable, RecordingTransport>,
    scanner: MockScannerHandle,
    transport: RecordingTransport,
    topups: ReconciliationHandler<RecordingTransport>,
}

fn harness() -> Harness {
    let (scanner, handle) = MockScanner::new();
    let transport = RecordingTransport::default();
    let publisher = Publisher::new(transport.clone(), Topics::new("team_a").unwrap());
    let cache = BalanceCache::new();

    let resolver = BalanceResolver::new(
        vec![Unreachable("primary"), Unreachable("secondary")],
        cache.clone(),
    );
    let topups = ReconciliationHandler::new(cache, publisher.clone());
    let bridge = BridgeLoop::new(scanner, resolver, publisher, BridgeSettings::default());

    Harness {
        bridge,
        scanner: handle,
        transport,
        topups,
    }
}

async fn steps(bridge: &mut BridgeLoop<MockScanner, Unreachable, RecordingTransport>, n: usize) {
    for _ in 0..n {
        bridge.step().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_detect_then_remove_on_silence() {
    let mut h = harness();
    h.scanner.send_line("A1B2C3D4").await.unwrap();

    let outcome = h.bridge.step().await;
    assert!(matches!(outcome, StepOutcome::Card { detected: true, .. }));

    // ~200ms per idle step, well past the 2s silence timeout
    steps(&mut h.bridge, 15).await;

    let status = h.transport.on(STATUS);
    assert_eq!(status.len(), 2);

    assert_eq!(status[0]["uid"], "A1B2C3D4");
    assert_eq!(status[0]["balance"], 50.0);
    assert_eq!(status[0]["status"], "detected");

    assert_eq!(status[1]["uid"], "A1B2C3D4");
    assert_eq!(status[1]["status"], "removed");
    assert!(status[1].get("balance").is_none());

    let uid = Uid::new("A1B2C3D4").unwrap();
    assert_eq!(h.bridge.resolver().cache().balance(&uid), Some(50.0));
}

#[tokio::test(start_paused = true)]
async fn test_embedded_token_and_boot_noise() {
    let mut h = harness();
    h.scanner.send_line("System ready").await.unwrap();
    h.scanner.send_line("wifi connecting DEADBEEF").await.unwrap();
    h.scanner.send_line("tag seen: a1b2c3d4 ok").await.unwrap();

    assert_eq!(h.bridge.step().await, StepOutcome::Log);
    assert_eq!(h.bridge.step().await, StepOutcome::Log);
    assert_eq!(
        h.bridge.step().await,
        StepOutcome::Card {
            uid: Uid::new("A1B2C3D4").unwrap(),
            detected: true
        }
    );

    let status = h.transport.on(STATUS);
    assert_eq!(status.len(), 1);
    assert_eq!(status[0]["uid"], "A1B2C3D4");
}

#[tokio::test(start_paused = true)]
async fn test_card_swap_publishes_removed_before_detected() {
    let mut h = harness();
    h.scanner.send_line("A1B2C3D4").await.unwrap();
    h.scanner.send_line("04A1B2C3D4E5F6").await.unwrap();

    steps(&mut h.bridge, 2).await;

    let status = h.transport.on(STATUS);
    let sequence: Vec<(&str, &str)> = status
        .iter()
        .map(|v| (v["uid"].as_str().unwrap(), v["status"].as_str().unwrap()))
        .collect();
    assert_eq!(
        sequence,
        vec![
            ("A1B2C3D4", "detected"),
            ("A1B2C3D4", "removed"),
            ("04A1B2C3D4E5F6", "detected"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_topup_balance_is_used_on_next_detection() {
    let mut h = harness();
    h.scanner.send_line("A1B2C3D4").await.unwrap();
    h.bridge.step().await;

    let applied = h
        .topups
        .handle(TOPUP, br#"{"uid":"A1B2C3D4","amount":20}"#)
        .await;
    assert!(matches!(
        applied,
        ReconcileOutcome::Applied { new_balance, .. } if new_balance == 70.0
    ));

    let applied = h
        .topups
        .handle(TOPUP, br#"{"uid":"A1B2C3D4","new_balance":100}"#)
        .await;
    assert!(matches!(
        applied,
        ReconcileOutcome::Applied { new_balance, .. } if new_balance == 100.0
    ));

    // Card leaves, then comes back while every backend is still down
    steps(&mut h.bridge, 15).await;
    h.scanner.send_line("A1B2C3D4").await.unwrap();
    h.bridge.step().await;

    let status = h.transport.on(STATUS);
    assert_eq!(status.len(), 3);
    assert_eq!(status[2]["status"], "detected");
    assert_eq!(status[2]["balance"], 100.0);

    let balance = h.transport.on(BALANCE);
    assert_eq!(balance.len(), 2);
    assert_eq!(balance[0]["new_balance"], 70.0);
    assert_eq!(balance[1]["new_balance"], 100.0);
    assert_eq!(balance[1]["status"], "success");
}

#[tokio::test(start_paused = true)]
async fn test_topup_does_not_touch_presence() {
    let mut h = harness();

    h.topups
        .handle(TOPUP, br#"{"uid":"A1B2C3D4","amount":20}"#)
        .await;

    assert!(!h.bridge.tracker().is_present());
    assert!(h.transport.on(STATUS).is_empty());

    h.scanner.send_line("A1B2C3D4").await.unwrap();
    h.bridge.step().await;

    let status = h.transport.on(STATUS);
    assert_eq!(status[0]["balance"], 20.0);
}
