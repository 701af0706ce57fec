//! Error type shared by every host capability.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide this capability right now.
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// The engine or another host component rejected a call.
    #[error("Host call failed: {0}")]
    OperationFailed(String),

    /// Key/value persistence failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The server answered a media request with something else, usually an
    /// XML or JSON error body.
    #[error("{url} returned {actual}, expected {expected}")]
    UnexpectedContentType {
        url: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
