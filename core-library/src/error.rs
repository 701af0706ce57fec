//! Errors raised while reading the catalog or the caches.

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    /// File fetch or key/value storage failure.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// A catalog client call failed for one resource.
    #[error("Could not fetch {resource} '{id}': {message}")]
    Fetch {
        resource: &'static str,
        id: String,
        message: String,
    },

    /// The server has no record with that id.
    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: String, id: String },

    /// A cached value no longer decodes as its model.
    #[error("Cached value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    /// Wrap a client error with the resource it was fetching.
    pub fn fetch(resource: &'static str, id: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            resource,
            id: id.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
