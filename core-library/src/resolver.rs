//! # Catalog Resolver
//!
//! Cache-first lookup of catalog objects and artwork files.
//!
//! ## Overview
//!
//! Every lookup consults, in order:
//! 1. the server's [`OfflineCache`] (downloaded content),
//! 2. the in-memory [`QueryCache`] (results fetched this session),
//! 3. the server itself through a [`CatalogClient`].
//!
//! Newly fetched objects are written back to the query cache, together with
//! the side data a fetch reveals (album cover-art ids, starred flags), so a
//! concurrent download job or view never fetches them twice.
//!
//! Artwork lookups return local file paths. They check the query cache, then
//! files already on disk, then download through the host [`FileFetcher`].

use crate::cache::{CacheKey, OfflineCache, QueryCache};
use crate::catalog::CatalogClient;
use crate::error::Result;
use crate::models::{AlbumSongs, ArtistAlbums, ArtistInfo, ImageSize, PlaylistSongs, Song};
use bridge_traits::storage::{FetchFileRequest, FileFetcher, FileKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const IMAGE_CONTENT_TYPE: &str = "image";

/// Cache-first resolver shared by playback and downloads.
#[derive(Clone)]
pub struct CatalogResolver {
    offline: OfflineCache,
    query: Arc<QueryCache>,
    fetcher: Arc<dyn FileFetcher>,
}

impl CatalogResolver {
    pub fn new(offline: OfflineCache, query: Arc<QueryCache>, fetcher: Arc<dyn FileFetcher>) -> Self {
        Self {
            offline,
            query,
            fetcher,
        }
    }

    pub fn offline(&self) -> &OfflineCache {
        &self.offline
    }

    pub fn query(&self) -> &QueryCache {
        &self.query
    }

    pub fn fetcher(&self) -> &Arc<dyn FileFetcher> {
        &self.fetcher
    }

    async fn resolve<T, F, Fut>(&self, server_id: &str, key: CacheKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.offline.get::<T>(server_id, &key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "Resolved from offline cache");
                return Ok(value);
            }
            Ok(None) => {}
            // A broken store must not make the catalog unreachable
            Err(e) => warn!(key = %key, error = %e, "Offline cache read failed"),
        }

        if let Some(value) = self.query.get::<T>(server_id, &key) {
            debug!(key = %key, "Resolved from query cache");
            return Ok(value);
        }

        let value = fetch().await?;
        self.query.set(server_id, key, &value);
        Ok(value)
    }

    // =========================================================================
    // Catalog objects
    // =========================================================================

    pub async fn song(&self, server_id: &str, client: &dyn CatalogClient, id: &str) -> Result<Song> {
        self.resolve(server_id, CacheKey::song(id), || async {
            let song = client.fetch_song(id).await?;
            self.remember_starred(server_id, &song.id, song.starred.is_some());
            Ok(song)
        })
        .await
    }

    pub async fn album(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        id: &str,
    ) -> Result<AlbumSongs> {
        self.resolve(server_id, CacheKey::album(id), || async {
            let album = client.fetch_album(id).await?;
            self.remember_starred(server_id, &album.album.id, album.album.starred.is_some());
            for song in &album.songs {
                self.remember_starred(server_id, &song.id, song.starred.is_some());
            }
            self.query.set(
                server_id,
                CacheKey::album_cover_art(&album.album.id),
                &album.album.cover_art,
            );
            Ok(album)
        })
        .await
    }

    pub async fn artist(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        id: &str,
    ) -> Result<ArtistAlbums> {
        self.resolve(server_id, CacheKey::artist(id), || async {
            let artist = client.fetch_artist(id).await?;
            self.remember_starred(server_id, &artist.artist.id, artist.artist.starred.is_some());
            for album in &artist.albums {
                self.remember_starred(server_id, &album.id, album.starred.is_some());
                self.query
                    .set(server_id, CacheKey::album_cover_art(&album.id), &album.cover_art);
            }
            Ok(artist)
        })
        .await
    }

    pub async fn artist_info(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        id: &str,
    ) -> Result<ArtistInfo> {
        self.resolve(server_id, CacheKey::artist_info(id), || {
            client.fetch_artist_info(id)
        })
        .await
    }

    pub async fn playlist(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        id: &str,
    ) -> Result<PlaylistSongs> {
        self.resolve(server_id, CacheKey::playlist(id), || async {
            let playlist = client.fetch_playlist(id).await?;
            for song in &playlist.songs {
                self.remember_starred(server_id, &song.id, song.starred.is_some());
            }
            Ok(playlist)
        })
        .await
    }

    fn remember_starred(&self, server_id: &str, id: &str, starred: bool) {
        self.query.set(server_id, CacheKey::starred_item(id), &starred);
    }

    /// Cover-art id of an album, fetching the album if it is not known yet.
    ///
    /// Returns `Ok(None)` when the album has no cover art.
    pub async fn album_cover_art(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        album_id: &str,
    ) -> Result<Option<String>> {
        let known = self
            .query
            .get::<Option<String>>(server_id, &CacheKey::album_cover_art(album_id))
            .flatten();
        if known.is_some() {
            return Ok(known);
        }

        let album = self.album(server_id, client, album_id).await?;
        Ok(album.album.cover_art.filter(|c| !c.is_empty()))
    }

    // =========================================================================
    // Artwork files
    // =========================================================================

    /// Thumbnail path for a cover-art id if one is already known, without I/O.
    pub fn cached_cover_art_thumb(&self, server_id: &str, cover_art: &str) -> Option<String> {
        let existing = CacheKey::existing_file(FileKind::CoverArtThumb, cover_art);
        self.query
            .get::<Option<String>>(server_id, &existing)
            .flatten()
            .or_else(|| {
                self.query.get::<String>(
                    server_id,
                    &CacheKey::cover_art(cover_art, ImageSize::Thumbnail),
                )
            })
    }

    /// Local path of cover art, downloading it when it is not on disk.
    #[instrument(skip(self, client))]
    pub async fn cover_art_file(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        cover_art: &str,
        size: ImageSize,
    ) -> Result<String> {
        let kind = match size {
            ImageSize::Thumbnail => FileKind::CoverArtThumb,
            ImageSize::Original => FileKind::CoverArt,
        };
        let request = FetchFileRequest::new(
            kind,
            cover_art,
            client.cover_art_uri(cover_art, size),
            IMAGE_CONTENT_TYPE,
        );
        let path = self.existing_or_fetch(server_id, request).await?;
        self.query.set(server_id, CacheKey::cover_art(cover_art, size), &path);
        Ok(path)
    }

    /// Local path of artist art downloaded from a third-party URL.
    #[instrument(skip(self, source_url))]
    pub async fn artist_art_file(
        &self,
        server_id: &str,
        artist_id: &str,
        size: ImageSize,
        source_url: &str,
    ) -> Result<String> {
        let kind = match size {
            ImageSize::Thumbnail => FileKind::ArtistArtThumb,
            ImageSize::Original => FileKind::ArtistArt,
        };
        let request = FetchFileRequest::new(kind, artist_id, source_url, IMAGE_CONTENT_TYPE);
        let path = self.existing_or_fetch(server_id, request).await?;
        self.query.set(server_id, CacheKey::artist_art(artist_id, size), &path);
        Ok(path)
    }

    async fn existing_or_fetch(&self, server_id: &str, request: FetchFileRequest) -> Result<String> {
        let existing = self
            .fetcher
            .fetch_existing_file(server_id, request.kind, &request.id)
            .await?
            .map(|p| path_string(&p));
        self.query.set(
            server_id,
            CacheKey::existing_file(request.kind, &request.id),
            &existing,
        );

        if let Some(path) = existing {
            return Ok(path);
        }

        let path = self.fetcher.fetch_file(server_id, request, None).await?;
        Ok(path_string(&path))
    }
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
