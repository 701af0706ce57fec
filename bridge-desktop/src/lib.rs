//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `KeyValueStore` using a SQLite table (`sqlx`)
//! - `FileFetcher` streaming downloads with `reqwest`
//! - `NetworkMonitor` using a TCP connectivity probe
//!
//! The audio engine is always host-provided; desktop hosts wrap their
//! player of choice behind [`bridge_traits::AudioEngine`].
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{default_data_dir, HttpFileFetcher, SqliteKeyValueStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let data_dir = default_data_dir();
//!     let store = SqliteKeyValueStore::new(data_dir.join("cache.db")).await?;
//!     let fetcher = HttpFileFetcher::new(data_dir.join("files"))?;
//!     // Hand both to the core service
//!     Ok(())
//! }
//! ```

mod fetcher;
mod kv_store;
mod network;

use std::path::PathBuf;

pub use fetcher::HttpFileFetcher;
pub use kv_store::SqliteKeyValueStore;
pub use network::DesktopNetworkMonitor;

/// Per-user application data directory, falling back to the temp dir.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("player-core")
}
