//! Storage Abstractions
//!
//! Provides platform-agnostic traits for server-scoped file downloads and a
//! namespaced, persisted key-value store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Kind of file materialized on local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    Song,
    CoverArt,
    CoverArtThumb,
    ArtistArt,
    ArtistArtThumb,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Song => "song",
            FileKind::CoverArt => "coverArt",
            FileKind::CoverArtThumb => "coverArtThumb",
            FileKind::ArtistArt => "artistArt",
            FileKind::ArtistArtThumb => "artistArtThumb",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte progress callback: `(received, total)`.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Description of a file to fetch into local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFileRequest {
    pub kind: FileKind,
    pub id: String,
    pub source_url: String,
    /// Major MIME type the response must carry (e.g. `audio`, `image`).
    pub expected_content_type: String,
    /// Append a cache-busting query parameter to the source URL.
    pub use_cache_buster: bool,
}

impl FetchFileRequest {
    pub fn new(
        kind: FileKind,
        id: impl Into<String>,
        source_url: impl Into<String>,
        expected_content_type: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            source_url: source_url.into(),
            expected_content_type: expected_content_type.into(),
            use_cache_buster: true,
        }
    }

    pub fn without_cache_buster(mut self) -> Self {
        self.use_cache_buster = false;
        self
    }
}

/// Server-scoped file downloader.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{FetchFileRequest, FileFetcher, FileKind};
///
/// async fn thumb(fetcher: &dyn FileFetcher, url: String) -> Result<PathBuf> {
///     let request = FetchFileRequest::new(FileKind::CoverArtThumb, "al-1", url, "image");
///     fetcher.fetch_file("server-1", request, None).await
/// }
/// ```
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Download a file, returning its local path.
    async fn fetch_file(
        &self,
        server_id: &str,
        request: FetchFileRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PathBuf>;

    /// Return the local path of a previously fetched file, if present.
    async fn fetch_existing_file(
        &self,
        server_id: &str,
        kind: FileKind,
        id: &str,
    ) -> Result<Option<PathBuf>>;
}

/// Namespaced key-value storage persisted across restarts.
///
/// Values are opaque strings; callers serialize structured values themselves.
///
/// # Platform Support
///
/// - **Desktop**: SQLite table
/// - **iOS/Android**: MMKV or platform preferences
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Remove every key in a namespace.
    async fn clear(&self, namespace: &str) -> Result<()>;

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_names_match_cache_segments() {
        assert_eq!(FileKind::CoverArtThumb.to_string(), "coverArtThumb");
        assert_eq!(FileKind::Song.as_str(), "song");
    }

    #[test]
    fn test_fetch_request_defaults_to_cache_buster() {
        let request = FetchFileRequest::new(FileKind::Song, "s1", "http://x/s1", "audio");
        assert!(request.use_cache_buster);
        assert!(!request.without_cache_buster().use_cache_buster);
    }
}
