//! Device heartbeat.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tapbridge_core::{LinkStatus, UnixTimestamp};
use tapbridge_protocol::{HealthPayload, TopicEvent};
use tokio::net::UdpSocket;
use tracing::debug;

/// Static metadata reported in every heartbeat.
///
/// On a host bridge there is no radio or heap to measure, so `rssi` and
/// `free_heap` are configured values.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthConfig {
    pub ssid: Option<String>,
    pub rssi: i32,
    pub free_heap: u64,
    /// Address used to discover the outbound interface. Nothing is sent.
    pub probe_addr: SocketAddr,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            ssid: None,
            rssi: -50,
            free_heap: 40_000,
            probe_addr: SocketAddr::from(([8, 8, 8, 8], 80)),
        }
    }
}

/// Builds `device/health` events.
#[derive(Debug, Clone, Default)]
pub struct HealthReporter {
    config: HealthConfig,
}

impl HealthReporter {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Current heartbeat.
    pub async fn snapshot(&self) -> TopicEvent {
        TopicEvent::Health(HealthPayload {
            status: LinkStatus::Online.as_str().to_string(),
            ssid: self.config.ssid.clone(),
            ip: self.local_ip().await.to_string(),
            rssi: self.config.rssi,
            free_heap: self.config.free_heap,
            ts: UnixTimestamp::now(),
        })
    }

    /// Outbound interface address, `127.0.0.1` when there is no route.
    ///
    /// Connecting a UDP socket only selects a route; no packet leaves the
    /// host.
    pub async fn local_ip(&self) -> IpAddr {
        match probe_route(self.config.probe_addr).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!(probe = %self.config.probe_addr, error = %e, "No outbound route");
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            }
        }
    }
}

async fn probe_route(target: SocketAddr) -> std::io::Result<IpAddr> {
    let bind: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(target).await?;
    Ok(socket.local_addr()?.ip())
}
