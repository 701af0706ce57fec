//! # Event Bus System
//!
//! Broadcasts typed domain events from the player core to the host UI using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`PlaybackEvent`] for the session controller and
//!   [`DownloadEvent`] for the offline download queue, wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//!
//! The bus is fan-out only. Commands flowing *into* the core (engine
//! callbacks, network changes) go through the playback dispatcher's own
//! single-consumer channel, never through this bus.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Queued {
//!     server_id: "srv".to_string(),
//!     song_id: "s1".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Download queued");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: all senders dropped; the core shut down.
//!
//! Publishers ignore `SendError`: having no UI subscribed is normal.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::SessionCreated { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback session controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new session replaced the previous one.
    SessionCreated {
        context_id: String,
        title: String,
        /// `album`, `playlist`, `song` or `artist`.
        queue_type: String,
        queue_len: usize,
        current_index: usize,
        shuffled: bool,
    },
    /// The session was torn down (empty queue or explicit stop).
    SessionCleared,
    /// The song under the engine's pointer changed.
    CurrentTrackChanged {
        song_id: Option<String>,
        index: Option<usize>,
    },
    /// Engine playback state changed (`playing`, `paused`, ...).
    StateChanged { state: String },
    RepeatModeChanged { mode: String },
    ShuffleChanged {
        shuffled: bool,
        current_index: usize,
    },
    /// A queue sync job finished with the given outcome.
    QueueSynced { outcome: String },
    /// A controller job failed. Recoverable errors already triggered a repair.
    Error { message: String, recoverable: bool },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SessionCreated { .. } => "Playback session created",
            PlaybackEvent::SessionCleared => "Playback session cleared",
            PlaybackEvent::CurrentTrackChanged { .. } => "Current track changed",
            PlaybackEvent::StateChanged { .. } => "Player state changed",
            PlaybackEvent::RepeatModeChanged { .. } => "Repeat mode changed",
            PlaybackEvent::ShuffleChanged { .. } => "Shuffle toggled",
            PlaybackEvent::QueueSynced { .. } => "Queue window synced",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events emitted by the offline download queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Queued {
        server_id: String,
        song_id: String,
    },
    /// Audio byte progress for the running job.
    Progress {
        server_id: String,
        song_id: String,
        received: u64,
        total: Option<u64>,
    },
    Completed {
        server_id: String,
        song_id: String,
    },
    Failed {
        server_id: String,
        song_id: String,
        message: String,
    },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Queued { .. } => "Download queued",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Clone freely; all clones share one broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus. Subscribers falling more than `capacity`
    /// events behind receive `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
