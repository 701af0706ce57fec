//! # Download Module
//!
//! Offline downloads of songs and everything needed to play them without a
//! connection.
//!
//! ## Overview
//!
//! This module manages:
//! - `DownloadJob` records and the per-server pending queues
//! - `DownloadPipeline`, the staged fetch of song, album, artist, artwork and
//!   audio into the offline cache
//! - `DownloadManager`, which deduplicates requests and runs jobs one at a
//!   time on their own lane

pub mod error;
pub mod job;
pub mod manager;
pub mod pipeline;

pub use error::{DownloadError, Result};
pub use job::{DownloadJob, DownloadJobId, DownloadQueues};
pub use manager::DownloadManager;
pub use pipeline::DownloadPipeline;
