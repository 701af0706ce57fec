//! # Host Bridge Traits
//!
//! The seams between the player core and the application hosting it.
//!
//! The core never touches audio output, the filesystem layout, persistent
//! storage or the OS network stack directly. It talks to these traits instead:
//!
//! - [`AudioEngine`](playback::AudioEngine) holds the native 3-slot track
//!   window and reports callbacks as [`EngineEvent`](playback::EngineEvent)s
//! - [`FileFetcher`](storage::FileFetcher) downloads audio and artwork into
//!   server-scoped local paths
//! - [`KeyValueStore`](storage::KeyValueStore) persists the offline cache,
//!   one namespace per server
//! - [`NetworkMonitor`](network::NetworkMonitor) reports whether the link is
//!   metered
//! - [`LoggerSink`](logging::LoggerSink) receives forwarded log entries
//!
//! `bridge-desktop` implements the storage, fetch and network traits for
//! desktop builds; mobile hosts inject their own. The audio engine is always
//! host-provided.
//!
//! Every trait is `Send + Sync` and returns [`BridgeError`](error::BridgeError).
//! Messages must not carry stream URLs with their query string.

pub mod error;
pub mod logging;
pub mod network;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use network::{
    ConnectivityClass, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus,
    NetworkType,
};
pub use playback::{AudioEngine, EngineEvent, EngineTrack, PlayerOptions, PlayerState, Progress};
pub use storage::{FetchFileRequest, FileFetcher, FileKind, KeyValueStore, ProgressCallback};
