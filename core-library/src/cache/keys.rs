//! Cache keys shared by the offline and query caches

use crate::models::ImageSize;
use bridge_traits::storage::FileKind;
use std::fmt;

/// Identifies one cached resource.
///
/// Rendered as its kind followed by its parameters, joined with `.`
/// (`album.al-1`, `coverArt.al-1.thumbnail`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// [`Song`](crate::models::Song) by song id
    Song(String),
    /// Local file path of a downloaded song
    SongPath(String),
    /// [`AlbumSongs`](crate::models::AlbumSongs) by album id
    Album(String),
    /// [`ArtistAlbums`](crate::models::ArtistAlbums) by artist id
    Artist(String),
    /// [`ArtistInfo`](crate::models::ArtistInfo) by artist id
    ArtistInfo(String),
    /// [`PlaylistSongs`](crate::models::PlaylistSongs) by playlist id
    Playlist(String),
    /// Cover-art id of an album, by album id
    AlbumCoverArt(String),
    /// Whether an item is starred, by item id
    StarredItem(String),
    /// Local path of cover art
    CoverArt { cover_art: String, size: ImageSize },
    /// Local path of artist art
    ArtistArt { artist_id: String, size: ImageSize },
    /// Local path of a file already present on disk
    ExistingFile { kind: FileKind, id: String },
}

impl CacheKey {
    pub fn song(id: impl Into<String>) -> Self {
        Self::Song(id.into())
    }

    pub fn song_path(id: impl Into<String>) -> Self {
        Self::SongPath(id.into())
    }

    pub fn album(id: impl Into<String>) -> Self {
        Self::Album(id.into())
    }

    pub fn artist(id: impl Into<String>) -> Self {
        Self::Artist(id.into())
    }

    pub fn artist_info(id: impl Into<String>) -> Self {
        Self::ArtistInfo(id.into())
    }

    pub fn playlist(id: impl Into<String>) -> Self {
        Self::Playlist(id.into())
    }

    pub fn album_cover_art(id: impl Into<String>) -> Self {
        Self::AlbumCoverArt(id.into())
    }

    pub fn starred_item(id: impl Into<String>) -> Self {
        Self::StarredItem(id.into())
    }

    pub fn cover_art(cover_art: impl Into<String>, size: ImageSize) -> Self {
        Self::CoverArt {
            cover_art: cover_art.into(),
            size,
        }
    }

    pub fn artist_art(artist_id: impl Into<String>, size: ImageSize) -> Self {
        Self::ArtistArt {
            artist_id: artist_id.into(),
            size,
        }
    }

    pub fn existing_file(kind: FileKind, id: impl Into<String>) -> Self {
        Self::ExistingFile {
            kind,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::Song(_) => "song",
            CacheKey::SongPath(_) => "songPath",
            CacheKey::Album(_) => "album",
            CacheKey::Artist(_) => "artist",
            CacheKey::ArtistInfo(_) => "artistInfo",
            CacheKey::Playlist(_) => "playlist",
            CacheKey::AlbumCoverArt(_) => "albumCoverArt",
            CacheKey::StarredItem(_) => "starredItems",
            CacheKey::CoverArt { .. } => "coverArt",
            CacheKey::ArtistArt { .. } => "artistArt",
            CacheKey::ExistingFile { .. } => "existingFiles",
        }
    }

    fn params(&self) -> Vec<&str> {
        match self {
            CacheKey::Song(id)
            | CacheKey::SongPath(id)
            | CacheKey::Album(id)
            | CacheKey::Artist(id)
            | CacheKey::ArtistInfo(id)
            | CacheKey::Playlist(id)
            | CacheKey::AlbumCoverArt(id)
            | CacheKey::StarredItem(id) => vec![id.as_str()],
            CacheKey::CoverArt { cover_art, size } => vec![cover_art.as_str(), size.as_str()],
            CacheKey::ArtistArt { artist_id, size } => vec![artist_id.as_str(), size.as_str()],
            CacheKey::ExistingFile { kind, id } => vec![kind.as_str(), id.as_str()],
        }
    }

    /// Deterministic string form used as the storage key.
    pub fn render(&self) -> String {
        let mut segments = vec![self.kind()];
        segments.extend(self.params());
        segments.join(".")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
