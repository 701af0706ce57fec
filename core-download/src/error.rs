//! # Download Error Types
//!
//! Error types for the offline download pipeline.

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("No active server to download from")]
    NoActiveServer,

    #[error("No catalog client for server '{0}'")]
    UnknownServer(String),

    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// Songs are stored with their album; without one there is nothing to
    /// attach the download to.
    #[error("Song {song_id} has no album id")]
    MissingAlbumId { song_id: String },

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// The audio file transfer failed.
    #[error("File transfer failed: {0}")]
    Transfer(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl DownloadError {
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DownloadError::NoActiveServer | DownloadError::UnknownServer(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        assert!(DownloadError::NoActiveServer.is_configuration_error());
        assert!(DownloadError::UnknownServer("x".into()).is_configuration_error());
        assert!(!DownloadError::MissingAlbumId {
            song_id: "s1".into()
        }
        .is_configuration_error());
    }

    #[test]
    fn test_missing_album_message() {
        let err = DownloadError::MissingAlbumId {
            song_id: "s1".into(),
        };
        assert_eq!(err.to_string(), "Song s1 has no album id");
    }
}
