//! # Catalog Collaborators
//!
//! Server-scoped fetch interfaces for catalog data and media URLs.
//!
//! ## Overview
//!
//! The wire protocol is owned by the host. The core only needs:
//! - [`CatalogClient`]: fetches songs, albums, artists, artist info and
//!   playlists from one server, and builds stream/download/cover-art URLs.
//! - [`CatalogProvider`]: knows which server is active and hands out the
//!   client for a server id.
//!
//! [`StaticCatalogProvider`] is a registry-backed provider suitable for hosts
//! that construct their clients up front.

use crate::error::Result;
use crate::models::{AlbumSongs, ArtistAlbums, ArtistInfo, ImageSize, PlaylistSongs, Song};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Catalog access for a single server.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_song(&self, id: &str) -> Result<Song>;

    async fn fetch_album(&self, id: &str) -> Result<AlbumSongs>;

    async fn fetch_artist(&self, id: &str) -> Result<ArtistAlbums>;

    async fn fetch_artist_info(&self, id: &str) -> Result<ArtistInfo>;

    async fn fetch_playlist(&self, id: &str) -> Result<PlaylistSongs>;

    /// Report a play of the song to the server.
    async fn scrobble(&self, id: &str) -> Result<()>;

    /// Streaming URL for a song.
    ///
    /// # Arguments
    /// * `max_bitrate` - Ceiling in kbps; `0` means no limit
    /// * `estimate_content_length` - Ask the server to send a Content-Length
    ///   for transcoded streams
    fn stream_uri(&self, id: &str, max_bitrate: u32, estimate_content_length: bool) -> String;

    /// URL of the original, untranscoded file.
    fn download_uri(&self, id: &str) -> String;

    fn cover_art_uri(&self, cover_art: &str, size: ImageSize) -> String;
}

/// Resolves catalog clients by server id.
pub trait CatalogProvider: Send + Sync {
    fn active_server_id(&self) -> Option<String>;

    fn client(&self, server_id: &str) -> Option<Arc<dyn CatalogClient>>;

    /// The active server id together with its client.
    fn active_client(&self) -> Option<(String, Arc<dyn CatalogClient>)> {
        let server_id = self.active_server_id()?;
        let client = self.client(&server_id)?;
        Some((server_id, client))
    }
}

/// Catalog provider backed by an in-memory registry of clients.
#[derive(Default)]
pub struct StaticCatalogProvider {
    clients: RwLock<HashMap<String, Arc<dyn CatalogClient>>>,
    active: RwLock<Option<String>>,
}

impl StaticCatalogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, server_id: impl Into<String>, client: Arc<dyn CatalogClient>) {
        self.clients.write().insert(server_id.into(), client);
    }

    pub fn unregister(&self, server_id: &str) {
        self.clients.write().remove(server_id);
        let mut active = self.active.write();
        if active.as_deref() == Some(server_id) {
            *active = None;
        }
    }

    /// Switch the active server. `None` leaves the player without a client.
    pub fn set_active(&self, server_id: Option<String>) {
        info!(server_id = ?server_id, "Active server changed");
        *self.active.write() = server_id;
    }
}

impl CatalogProvider for StaticCatalogProvider {
    fn active_server_id(&self) -> Option<String> {
        self.active.read().clone()
    }

    fn client(&self, server_id: &str) -> Option<Arc<dyn CatalogClient>> {
        self.clients.read().get(server_id).cloned()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockCatalog;
    use super::*;

    #[test]
    fn test_active_client_requires_registration() {
        let provider = StaticCatalogProvider::new();
        provider.set_active(Some("home".to_string()));
        assert!(provider.active_client().is_none());

        provider.register("home", Arc::new(MockCatalog::new()));
        let (server_id, _client) = provider.active_client().unwrap();
        assert_eq!(server_id, "home");
    }

    #[test]
    fn test_unregister_clears_active_server() {
        let provider = StaticCatalogProvider::new();
        provider.register("home", Arc::new(MockCatalog::new()));
        provider.register("work", Arc::new(MockCatalog::new()));
        provider.set_active(Some("home".to_string()));

        provider.unregister("work");
        assert_eq!(provider.active_server_id().as_deref(), Some("home"));

        provider.unregister("home");
        assert!(provider.active_server_id().is_none());
        assert!(provider.client("home").is_none());
    }
}
