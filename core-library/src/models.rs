//! Domain models for the remote catalog
//!
//! Values fetched from a catalog server. They are immutable once fetched;
//! re-fetching may refresh them. Every model serializes to camelCase JSON,
//! which is also the format persisted in the offline cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Cover-art id requested when an album has none; servers answer with their
/// placeholder image.
pub const PLACEHOLDER_COVER_ART: &str = "-1";

// =============================================================================
// Song
// =============================================================================

/// A playable song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    /// Length in whole seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f32>,
}

impl Song {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            album: None,
            album_id: None,
            artist: None,
            artist_id: None,
            track: None,
            disc_number: None,
            duration: None,
            starred: None,
            play_count: None,
            user_rating: None,
            average_rating: None,
        }
    }

    pub fn with_album(mut self, album_id: impl Into<String>, album: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self.album = Some(album.into());
        self
    }

    pub fn with_artist(mut self, artist_id: impl Into<String>, artist: impl Into<String>) -> Self {
        self.artist_id = Some(artist_id.into());
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }

    pub fn artist_or_unknown(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    pub fn album_or_unknown(&self) -> &str {
        self.album.as_deref().unwrap_or(UNKNOWN_ALBUM)
    }

    pub fn is_starred(&self) -> bool {
        self.starred.is_some()
    }
}

// =============================================================================
// Album
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl Album {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: None,
            artist_id: None,
            starred: None,
            cover_art: None,
            year: None,
        }
    }

    /// Cover-art id to request for this album, falling back to the server
    /// placeholder.
    pub fn cover_art_or_placeholder(&self) -> &str {
        self.cover_art
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(PLACEHOLDER_COVER_ART)
    }
}

/// An album together with its track list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumSongs {
    pub album: Album,
    pub songs: Vec<Song>,
}

/// Cover-art id known for an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumCoverArt {
    pub album_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
}

// =============================================================================
// Artist
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            starred: None,
            cover_art: None,
        }
    }
}

/// An artist together with their albums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistAlbums {
    pub artist: Artist,
    pub albums: Vec<Album>,
}

/// Supplementary artist data; image URLs point at third-party hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image_url: Option<String>,
}

impl ArtistInfo {
    /// Source URL for the requested artist image size, if the server knows one.
    pub fn image_url(&self, size: ImageSize) -> Option<&str> {
        match size {
            ImageSize::Thumbnail => self.small_image_url.as_deref(),
            ImageSize::Original => self.large_image_url.as_deref(),
        }
        .filter(|url| !url.is_empty())
    }
}

// =============================================================================
// Playlist
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            comment: None,
            cover_art: None,
        }
    }
}

/// A playlist together with its entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSongs {
    pub playlist: Playlist,
    pub songs: Vec<Song>,
}

// =============================================================================
// Enumerations
// =============================================================================

/// Where a play queue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Album,
    Playlist,
    Song,
    Artist,
}

impl QueueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Album => "album",
            QueueType::Playlist => "playlist",
            QueueType::Song => "song",
            QueueType::Artist => "artist",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artwork resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Thumbnail,
    Original,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Thumbnail => "thumbnail",
            ImageSize::Original => "original",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
