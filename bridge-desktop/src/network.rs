//! TCP-probe connectivity monitor for desktop hosts.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const PROBE_ADDR: &str = "1.1.1.1:443";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Desktop links are always reported unmetered. The probe only decides
/// between connected and disconnected.
#[derive(Debug, Clone)]
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self::with_probe(PROBE_ADDR, POLL_INTERVAL)
    }

    pub fn with_probe(probe_addr: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            poll_interval,
        }
    }

    async fn probe(&self) -> NetworkStatus {
        let connect = TcpStream::connect(self.probe_addr.as_str());
        match tokio::time::timeout(PROBE_TIMEOUT, connect).await {
            Ok(Ok(_)) => NetworkStatus::Connected,
            _ => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.probe().await;
        debug!(probe = %self.probe_addr, ?status, "Connectivity probed");
        Ok(NetworkInfo {
            status,
            // Ethernet and WiFi look the same from here
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            is_metered: false,
        })
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(ProbeStream {
            monitor: self.clone(),
            last: None,
        }))
    }
}

/// Polls the probe and yields only when the status flips.
struct ProbeStream {
    monitor: DesktopNetworkMonitor,
    last: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for ProbeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            if self.last.is_some() {
                tokio::time::sleep(self.monitor.poll_interval).await;
            }
            let Ok(info) = self.monitor.get_network_info().await else {
                continue;
            };
            if self.last != Some(info.status) {
                self.last = Some(info.status);
                return Some(info);
            }
        }
    }
}
