//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the server list, playback tuning, and offline storage
//! locations. Validation is fail-fast: [`CoreConfigBuilder::build`] rejects
//! inconsistent settings with an actionable message instead of letting the
//! player discover them mid-session.
//!
//! Host bridges (audio engine, file fetcher, key-value store) are not part of
//! this struct; they are injected through `core_service::CoreDependencies`.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, ServerConfig};
//!
//! let config = CoreConfig::builder()
//!     .server(ServerConfig::new("home", "https://music.example.com", "alice"))
//!     .active_server("home")
//!     .data_dir("/tmp/player")
//!     .max_bitrate_mobile(192)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.playback.max_bitrate_wifi, 0);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Active server must be one of the configured servers
//! let config = CoreConfig::builder()
//!     .data_dir("/tmp/player")
//!     .active_server("missing")
//!     .build()
//!     .expect("Should fail - unknown active server");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A remote catalog server the player can stream from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub address: String,
    pub username: String,
}

impl ServerConfig {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            username: username.into(),
        }
    }
}

/// Playback tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Minimum buffered media; half of it must be buffered before playback starts.
    pub min_buffer: Duration,
    pub max_buffer: Duration,
    /// Stream bitrate ceiling on unmetered links, in kbps. `0` means unlimited.
    pub max_bitrate_wifi: u32,
    /// Stream bitrate ceiling on metered links, in kbps. `0` means unlimited.
    pub max_bitrate_mobile: u32,
    /// Report plays to the server when the current song changes.
    pub scrobble: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            min_buffer: Duration::from_secs(6),
            max_buffer: Duration::from_secs(60),
            max_bitrate_wifi: 0,
            max_bitrate_mobile: 192,
            scrobble: false,
        }
    }
}

/// Offline storage locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root directory for downloaded songs and artwork.
    pub files_dir: PathBuf,
    /// SQLite file backing the offline cache.
    pub cache_db_path: PathBuf,
}

impl StorageSettings {
    fn under(data_dir: &std::path::Path) -> Self {
        Self {
            files_dir: data_dir.join("files"),
            cache_db_path: data_dir.join("offline-cache.db"),
        }
    }
}

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub servers: Vec<ServerConfig>,
    pub active_server_id: Option<String>,
    pub playback: PlaybackSettings,
    pub storage: StorageSettings,
    pub event_buffer_size: usize,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn server(&self, id: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Server ids are unique and the active server is one of them
    /// - Buffer sizes are ordered and non-zero
    /// - Storage paths are not empty
    pub fn validate(&self) -> Result<()> {
        for (i, server) in self.servers.iter().enumerate() {
            if server.id.trim().is_empty() {
                return Err(Error::Config("Server id cannot be empty".to_string()));
            }
            if self.servers[..i].iter().any(|s| s.id == server.id) {
                return Err(Error::Config(format!(
                    "Duplicate server id '{}'. Server ids must be unique.",
                    server.id
                )));
            }
        }

        if let Some(active) = &self.active_server_id {
            if self.server(active).is_none() {
                return Err(Error::Config(format!(
                    "Active server '{}' is not configured. Add it with .server() first.",
                    active
                )));
            }
        }

        if self.playback.min_buffer.is_zero() {
            return Err(Error::Config(
                "Minimum buffer must be greater than zero".to_string(),
            ));
        }

        if self.playback.max_buffer < self.playback.min_buffer {
            return Err(Error::Config(format!(
                "Maximum buffer ({:?}) must not be smaller than minimum buffer ({:?})",
                self.playback.max_buffer, self.playback.min_buffer
            )));
        }

        if self.storage.files_dir.as_os_str().is_empty() {
            return Err(Error::Config("Files directory cannot be empty".to_string()));
        }

        if self.storage.cache_db_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "Offline cache database path cannot be empty".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    servers: Vec<ServerConfig>,
    active_server_id: Option<String>,
    playback: PlaybackSettings,
    data_dir: Option<PathBuf>,
    files_dir: Option<PathBuf>,
    cache_db_path: Option<PathBuf>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.servers.push(server);
        self
    }

    pub fn active_server(mut self, id: impl Into<String>) -> Self {
        self.active_server_id = Some(id.into());
        self
    }

    /// Base directory; storage paths not set explicitly are derived from it.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn files_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.files_dir = Some(path.into());
        self
    }

    pub fn cache_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_db_path = Some(path.into());
        self
    }

    pub fn buffers(mut self, min_buffer: Duration, max_buffer: Duration) -> Self {
        self.playback.min_buffer = min_buffer;
        self.playback.max_buffer = max_buffer;
        self
    }

    pub fn max_bitrate_wifi(mut self, kbps: u32) -> Self {
        self.playback.max_bitrate_wifi = kbps;
        self
    }

    pub fn max_bitrate_mobile(mut self, kbps: u32) -> Self {
        self.playback.max_bitrate_mobile = kbps;
        self
    }

    pub fn scrobble(mut self, enabled: bool) -> Self {
        self.playback.scrobble = enabled;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no storage location is given or when
    /// [`CoreConfig::validate`] fails.
    pub fn build(self) -> Result<CoreConfig> {
        let derived = self.data_dir.as_deref().map(StorageSettings::under);

        let files_dir = self
            .files_dir
            .or_else(|| derived.as_ref().map(|s| s.files_dir.clone()))
            .ok_or_else(|| {
                Error::Config(
                    "Files directory is required. Use .data_dir() or .files_dir() to set it."
                        .to_string(),
                )
            })?;

        let cache_db_path = self
            .cache_db_path
            .or_else(|| derived.as_ref().map(|s| s.cache_db_path.clone()))
            .ok_or_else(|| {
                Error::Config(
                    "Offline cache path is required. Use .data_dir() or .cache_db_path() to set it."
                        .to_string(),
                )
            })?;

        let config = CoreConfig {
            servers: self.servers,
            active_server_id: self.active_server_id,
            playback: self.playback,
            storage: StorageSettings {
                files_dir,
                cache_db_path,
            },
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
