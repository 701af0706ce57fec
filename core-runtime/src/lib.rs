//! # Core Runtime
//!
//! Shared plumbing for the player crates:
//!
//! - [`config`]: server list, playback tuning and storage paths, with validation
//! - [`events`]: the broadcast bus carrying playback and download events to the UI
//! - [`logging`]: `tracing` subscriber setup and credential redaction helpers
//! - [`queue`]: [`SerialQueue`], the single-concurrency lane both the playback
//!   controller and the download manager run their jobs on

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod queue;

pub use error::{Error, Result};
pub use queue::{JobHandle, SerialQueue};
