//! # Playback Error Types
//!
//! Error types for the playback session controller.

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// No catalog client is configured for the active server.
    #[error("No active catalog client")]
    NoClient,

    // ========================================================================
    // Window Errors
    // ========================================================================
    /// The engine window is in a shape the sync algorithm never produces.
    ///
    /// The window is left untouched and the failure is reported.
    #[error("Engine window out of sync: {queue_len} slots, pointer at {current_index:?}")]
    EngineDesync {
        queue_len: usize,
        current_index: Option<usize>,
    },

    /// Requested index is outside the logical queue.
    #[error("Queue index {index} out of range for queue of {len}")]
    InvalidQueueIndex { index: usize, len: usize },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// The audio engine rejected a call.
    #[error("Audio engine error: {0}")]
    Engine(#[from] BridgeError),

    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Runtime error from the command serializer.
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` when the error only means "nothing to do here".
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, PlaybackError::NoClient)
    }

    /// Returns `true` if the engine window needs a forced rebuild.
    pub fn is_desync(&self) -> bool {
        matches!(self, PlaybackError::EngineDesync { .. })
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
