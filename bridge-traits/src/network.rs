//! Connectivity reporting
//!
//! The core only cares about one thing: whether the current link is metered.
//! That picks the streaming bitrate ceiling, and a change of class resets the
//! audio engine so queued stream URLs are rebuilt.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Cellular,
    WiFi,
    Ethernet,
    /// Connected, but the host cannot tell how
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
}

/// Coarse connectivity class used to pick a streaming bitrate ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityClass {
    /// Cellular or otherwise metered link
    Metered,
    /// WiFi, ethernet or unknown
    #[default]
    Unmetered,
}

impl ConnectivityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityClass::Metered => "metered",
            ConnectivityClass::Unmetered => "unmetered",
        }
    }
}

/// A snapshot reported by the host.
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// The OS flags the link as data-capped
    pub is_metered: bool,
}

impl NetworkInfo {
    /// Cellular links count as metered regardless of what the OS reports.
    pub fn connectivity_class(&self) -> ConnectivityClass {
        if self.network_type == Some(NetworkType::Cellular) || self.is_metered {
            ConnectivityClass::Metered
        } else {
            ConnectivityClass::Unmetered
        }
    }
}

/// Host connectivity source.
///
/// Mobile hosts back this with ConnectivityManager or NWPathMonitor; the
/// desktop shim probes with a TCP connect.
///
/// ```ignore
/// let mut changes = monitor.subscribe_changes().await?;
/// while let Some(info) = changes.next().await {
///     controller.set_connectivity(info.connectivity_class()).await?;
/// }
/// ```
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Yields an update whenever the status or class changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

#[async_trait::async_trait]
pub trait NetworkChangeStream: Send {
    /// `None` once the host stops reporting.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
