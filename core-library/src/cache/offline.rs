//! # Offline Cache
//!
//! Per-server persisted key/value store for downloaded content.
//!
//! ## Overview
//!
//! Every server gets its own namespace (`download-cache-<serverId>`) in the
//! host's [`KeyValueStore`]. Values are JSON; keys are rendered
//! [`CacheKey`]s. The download pipeline writes here once a song is fully
//! on disk, and catalog lookups read here before touching the network.
//!
//! Entries are never evicted. [`OfflineCache::reset`] drops a whole server
//! namespace.
//!
//! Writers race freely: a check followed by a write is not atomic, and the
//! last write wins. Values are keyed by resource id, so competing writers
//! store the same content.

use crate::cache::keys::CacheKey;
use crate::error::Result;
use crate::models::{AlbumSongs, ArtistAlbums, ArtistInfo, PlaylistSongs, Song};
use bridge_traits::storage::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persisted, server-scoped cache of downloaded resources.
#[derive(Clone)]
pub struct OfflineCache {
    store: Arc<dyn KeyValueStore>,
}

impl OfflineCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn namespace(server_id: &str) -> String {
        format!("download-cache-{}", server_id)
    }

    /// Read and decode a value.
    ///
    /// An entry that no longer decodes as `T` is treated as absent so that a
    /// stale schema never blocks a refetch.
    pub async fn get<T: DeserializeOwned>(&self, server_id: &str, key: &CacheKey) -> Result<Option<T>> {
        let raw = self
            .store
            .get(&Self::namespace(server_id), &key.render())
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(server_id, key = %key, error = %e, "Discarding undecodable offline cache entry");
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        server_id: &str,
        key: &CacheKey,
        value: &T,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store
            .set(&Self::namespace(server_id), &key.render(), &raw)
            .await?;
        debug!(server_id, key = %key, "Offline cache entry written");
        Ok(())
    }

    pub async fn remove(&self, server_id: &str, key: &CacheKey) -> Result<()> {
        self.store
            .delete(&Self::namespace(server_id), &key.render())
            .await?;
        Ok(())
    }

    pub async fn contains(&self, server_id: &str, key: &CacheKey) -> Result<bool> {
        Ok(self
            .store
            .contains(&Self::namespace(server_id), &key.render())
            .await?)
    }

    /// Drop every entry stored for a server.
    pub async fn reset(&self, server_id: &str) -> Result<()> {
        self.store.clear(&Self::namespace(server_id)).await?;
        info!(server_id, "Offline cache reset");
        Ok(())
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    pub async fn song(&self, server_id: &str, id: &str) -> Result<Option<Song>> {
        self.get(server_id, &CacheKey::song(id)).await
    }

    /// Local path of a downloaded song file.
    pub async fn song_path(&self, server_id: &str, id: &str) -> Result<Option<String>> {
        self.get(server_id, &CacheKey::song_path(id)).await
    }

    pub async fn album(&self, server_id: &str, id: &str) -> Result<Option<AlbumSongs>> {
        self.get(server_id, &CacheKey::album(id)).await
    }

    pub async fn artist(&self, server_id: &str, id: &str) -> Result<Option<ArtistAlbums>> {
        self.get(server_id, &CacheKey::artist(id)).await
    }

    pub async fn artist_info(&self, server_id: &str, id: &str) -> Result<Option<ArtistInfo>> {
        self.get(server_id, &CacheKey::artist_info(id)).await
    }

    pub async fn playlist(&self, server_id: &str, id: &str) -> Result<Option<PlaylistSongs>> {
        self.get(server_id, &CacheKey::playlist(id)).await
    }

    pub async fn is_downloaded(&self, server_id: &str, song_id: &str) -> Result<bool> {
        self.contains(server_id, &CacheKey::song_path(song_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Album;
    use bridge_desktop::SqliteKeyValueStore;

    async fn cache() -> OfflineCache {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();
        OfflineCache::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_typed_round_trip_through_store() {
        let cache = cache().await;
        let album = AlbumSongs {
            album: Album::new("al1", "Debut"),
            songs: vec![Song::new("s1", "Intro").with_album("al1", "Debut")],
        };

        cache.set("home", &CacheKey::album("al1"), &album).await.unwrap();

        assert_eq!(cache.album("home", "al1").await.unwrap(), Some(album));
        assert_eq!(cache.album("home", "al2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_servers_are_isolated() {
        let cache = cache().await;
        cache
            .set("home", &CacheKey::song_path("s1"), "/music/s1.mp3")
            .await
            .unwrap();

        assert!(cache.is_downloaded("home", "s1").await.unwrap());
        assert!(!cache.is_downloaded("work", "s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_clears_only_one_server() {
        let cache = cache().await;
        cache.set("home", &CacheKey::song("s1"), &Song::new("s1", "A")).await.unwrap();
        cache.set("work", &CacheKey::song("s1"), &Song::new("s1", "A")).await.unwrap();

        cache.reset("home").await.unwrap();

        assert!(cache.song("home", "s1").await.unwrap().is_none());
        assert!(cache.song("work", "s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_entry_reads_as_missing() {
        let store = Arc::new(SqliteKeyValueStore::in_memory().await.unwrap());
        store
            .set(&OfflineCache::namespace("home"), "song.s1", "{not json")
            .await
            .unwrap();
        let cache = OfflineCache::new(store);

        assert!(cache.song("home", "s1").await.unwrap().is_none());
    }

    #[test]
    fn test_namespace_format() {
        assert_eq!(OfflineCache::namespace("abc"), "download-cache-abc");
    }
}
