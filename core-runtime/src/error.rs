//! Errors raised by the runtime layer: configuration and the serial lanes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected configuration or logging setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A job on a serial lane panicked; the lane keeps running.
    #[error("Job panicked: {0}")]
    JobPanicked(String),

    /// The named lane was shut down before the job could run.
    #[error("Queue '{0}' is closed")]
    QueueClosed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
