//! Top-level error for the service façade.
//!
//! Every crate error converts into [`CoreError`] so host bindings deal with a
//! single type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A desktop shim could not be opened during bootstrap.
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),

    #[error("Invalid runtime setup: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error(transparent)]
    Library(#[from] core_library::LibraryError),

    #[error("Playback: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Download: {0}")]
    Download(#[from] core_download::DownloadError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
