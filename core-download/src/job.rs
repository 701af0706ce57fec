//! # Download Jobs
//!
//! One job per `(server, song)` pair, plus the per-server pending queues the
//! UI reads.
//!
//! ## Overview
//!
//! A [`DownloadJob`] is created when a download is requested and mutated in
//! place as the pipeline resolves the song, album, artist and playlist and as
//! audio bytes arrive. It leaves its queue when the pipeline settles, whether
//! it succeeded or not; the outcome is only logged and published as an event.

use chrono::{DateTime, Utc};
use core_library::models::{AlbumSongs, ArtistAlbums, ArtistInfo, PlaylistSongs, Song};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

/// Identifies a job by the song and the server it is downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadJobId {
    pub server_id: String,
    pub song_id: String,
}

impl DownloadJobId {
    pub fn new(server_id: impl Into<String>, song_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            song_id: song_id.into(),
        }
    }
}

impl fmt::Display for DownloadJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server_id, self.song_id)
    }
}

// ============================================================================
// Job
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadJob {
    pub id: DownloadJobId,
    /// Set when the download was requested from a playlist view.
    pub playlist_id: Option<String>,
    pub queued_at: DateTime<Utc>,
    /// Audio bytes received so far.
    pub received: u64,
    /// Expected audio size, when the server reports one.
    pub total: Option<u64>,
    pub song: Option<Song>,
    pub album: Option<AlbumSongs>,
    pub artist: Option<ArtistAlbums>,
    pub artist_info: Option<ArtistInfo>,
    pub playlist: Option<PlaylistSongs>,
}

impl DownloadJob {
    pub fn new(id: DownloadJobId, playlist_id: Option<String>) -> Self {
        Self {
            id,
            playlist_id,
            queued_at: Utc::now(),
            received: 0,
            total: None,
            song: None,
            album: None,
            artist: None,
            artist_info: None,
            playlist: None,
        }
    }

    pub fn song_id(&self) -> &str {
        &self.id.song_id
    }

    pub fn server_id(&self) -> &str {
        &self.id.server_id
    }

    pub fn record_progress(&mut self, received: u64, total: Option<u64>) {
        self.received = received;
        self.total = total;
    }

    /// Fraction of the audio file received, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.received as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

// ============================================================================
// Pending Queues
// ============================================================================

/// Pending and running jobs, ordered by request time, per server.
#[derive(Debug, Default)]
pub struct DownloadQueues {
    servers: RwLock<HashMap<String, Vec<DownloadJob>>>,
}

impl DownloadQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job unless one with the same id is already queued.
    ///
    /// Returns `false` for a duplicate.
    pub fn push(&self, job: DownloadJob) -> bool {
        let mut servers = self.servers.write();
        let queue = servers.entry(job.id.server_id.clone()).or_default();
        if queue.iter().any(|queued| queued.id == job.id) {
            return false;
        }
        queue.push(job);
        true
    }

    pub fn contains(&self, id: &DownloadJobId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &DownloadJobId) -> Option<DownloadJob> {
        self.servers
            .read()
            .get(&id.server_id)
            .and_then(|queue| queue.iter().find(|job| &job.id == id))
            .cloned()
    }

    /// Mutate a queued job in place. Returns `None` if it is gone.
    pub fn update<T>(&self, id: &DownloadJobId, f: impl FnOnce(&mut DownloadJob) -> T) -> Option<T> {
        self.servers
            .write()
            .get_mut(&id.server_id)
            .and_then(|queue| queue.iter_mut().find(|job| &job.id == id))
            .map(f)
    }

    pub fn remove(&self, id: &DownloadJobId) -> Option<DownloadJob> {
        let mut servers = self.servers.write();
        let queue = servers.get_mut(&id.server_id)?;
        let position = queue.iter().position(|job| &job.id == id)?;
        Some(queue.remove(position))
    }

    /// Snapshot of a server's queue in request order.
    pub fn jobs(&self, server_id: &str) -> Vec<DownloadJob> {
        self.servers
            .read()
            .get(server_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, server_id: &str) -> usize {
        self.servers.read().get(server_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, server_id: &str) -> bool {
        self.len(server_id) == 0
    }
}
