//! Audio engine bridge trait and supporting types.
//!
//! The host owns a native audio engine that holds a short track list with its
//! own current-index pointer. The core never hands it the whole logical queue;
//! it keeps at most three entries (previous, current, next) populated and
//! reacts to the [`EngineEvent`]s the host forwards back.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffering options handed to the engine when a player is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerOptions {
    /// Minimum amount of media to keep buffered.
    pub min_buffer: Duration,
    /// Amount of media that must be buffered before playback starts.
    pub play_buffer: Duration,
    /// Upper bound on buffered media.
    pub max_buffer: Duration,
}

impl PlayerOptions {
    /// Derive options from min/max buffer, using half of `min_buffer` as the
    /// play buffer.
    pub fn from_buffers(min_buffer: Duration, max_buffer: Duration) -> Self {
        Self {
            min_buffer,
            play_buffer: min_buffer / 2,
            max_buffer,
        }
    }
}

/// A single entry in the engine's track list.
///
/// `idx` is the position of the song in the logical queue, which lets the core
/// map an engine slot back to its session without searching by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineTrack {
    pub idx: usize,
    pub id: String,
    pub url: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
    pub duration: Option<Duration>,
    pub cover_art: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub track: Option<u32>,
    pub disc_number: Option<u32>,
}

/// Engine-reported playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    None,
    Ready,
    Playing,
    Paused,
    Stopped,
    Buffering,
    Connecting,
}

impl PlayerState {
    /// Whether the engine is playing or about to play.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlayerState::Playing | PlayerState::Buffering | PlayerState::Connecting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::None => "none",
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Stopped => "stopped",
            PlayerState::Buffering => "buffering",
            PlayerState::Connecting => "connecting",
        }
    }
}

/// Playback position snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub position: Duration,
    pub duration: Duration,
    pub buffered: Duration,
}

impl Progress {
    pub fn at(position: Duration) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Events a host forwards from its audio engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine's pointer moved to another slot.
    TrackChanged {
        next_index: Option<usize>,
        previous_index: Option<usize>,
    },
    /// The engine's playback state changed.
    PlaybackState { state: PlayerState },
    /// Periodic position report.
    Progress { progress: Progress },
    /// The engine failed to play the current source.
    PlaybackError { code: String, message: String },
    /// The engine ran out of tracks.
    QueueEnded { track: Option<usize> },
    /// Audio focus was lost or regained.
    RemoteDuck { paused: bool, permanent: bool },
    RemoteSeek { position: Duration },
    RemotePlay,
    RemotePause,
    RemoteNext,
    RemotePrevious,
    RemoteStop,
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TrackChanged { .. } => "track-changed",
            EngineEvent::PlaybackState { .. } => "playback-state",
            EngineEvent::Progress { .. } => "progress",
            EngineEvent::PlaybackError { .. } => "playback-error",
            EngineEvent::QueueEnded { .. } => "queue-ended",
            EngineEvent::RemoteDuck { .. } => "remote-duck",
            EngineEvent::RemoteSeek { .. } => "remote-seek",
            EngineEvent::RemotePlay => "remote-play",
            EngineEvent::RemotePause => "remote-pause",
            EngineEvent::RemoteNext => "remote-next",
            EngineEvent::RemotePrevious => "remote-previous",
            EngineEvent::RemoteStop => "remote-stop",
        }
    }
}

/// Contract for the host's native audio engine.
///
/// Every call is an async boundary. Callers are expected to serialize mutating
/// calls themselves; implementations do not need to guard against overlapping
/// `add`/`remove` sequences.
#[async_trait::async_trait]
pub trait AudioEngine: Send + Sync {
    /// Create (or recreate) the native player with the given buffering options.
    async fn setup(&self, options: PlayerOptions) -> Result<()>;

    /// Insert tracks before `insert_before`, or append when `None`.
    async fn add(&self, tracks: Vec<EngineTrack>, insert_before: Option<usize>) -> Result<()>;

    /// Remove the tracks at the given indices.
    async fn remove(&self, indices: Vec<usize>) -> Result<()>;

    /// Replace metadata of a track in place without reloading its source.
    async fn update_metadata(&self, index: usize, track: EngineTrack) -> Result<()>;

    async fn skip_to_next(&self) -> Result<()>;

    async fn skip_to_previous(&self) -> Result<()>;

    async fn seek_to(&self, position: Duration) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Clear the track list and stop playback, keeping the player alive.
    async fn reset(&self) -> Result<()>;

    /// Tear down the native player.
    async fn destroy(&self) -> Result<()>;

    async fn get_queue(&self) -> Result<Vec<EngineTrack>>;

    async fn get_current_index(&self) -> Result<Option<usize>>;

    async fn get_state(&self) -> Result<PlayerState>;
}
