//! # Track Mapping
//!
//! Turns logical queue entries into [`EngineTrack`]s and resolves the cover
//! art they display.
//!
//! ## Overview
//!
//! - Stream URLs carry a bitrate ceiling chosen from the connectivity class
//!   (`max_bitrate_mobile` on metered links, `max_bitrate_wifi` otherwise)
//!   and ask the server for a content length estimate. Songs already
//!   downloaded for the active server play from their local file.
//! - Artwork is attached only when a thumbnail path is already known, so
//!   mapping never waits on an image download.
//! - [`TrackMapper::fetch_queue_artwork`] fills the gaps for a whole queue in
//!   the background, fenced on the session context.

use crate::error::{PlaybackError, Result};
use crate::fence::{ContextFence, Fenced};
use crate::store::PlayerStore;
use bridge_traits::network::ConnectivityClass;
use bridge_traits::playback::{EngineTrack, PlayerOptions};
use core_library::cache::CacheKey;
use core_library::catalog::{CatalogClient, CatalogProvider};
use core_library::models::{ImageSize, Song};
use core_library::resolver::CatalogResolver;
use core_runtime::config::PlaybackSettings;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Album id → local thumbnail path.
type ArtworkPaths = HashMap<String, String>;

pub struct TrackMapper {
    store: Arc<PlayerStore>,
    catalog: Arc<dyn CatalogProvider>,
    resolver: CatalogResolver,
    settings: PlaybackSettings,
}

impl TrackMapper {
    pub fn new(
        store: Arc<PlayerStore>,
        catalog: Arc<dyn CatalogProvider>,
        resolver: CatalogResolver,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            resolver,
            settings,
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogProvider> {
        &self.catalog
    }

    /// Engine buffering options; playback starts at half the minimum buffer.
    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions::from_buffers(self.settings.min_buffer, self.settings.max_buffer)
    }

    pub fn active_client(&self) -> Result<(String, Arc<dyn CatalogClient>)> {
        self.catalog.active_client().ok_or(PlaybackError::NoClient)
    }

    pub fn max_bitrate(&self) -> u32 {
        match self.store.connectivity() {
            ConnectivityClass::Metered => self.settings.max_bitrate_mobile,
            ConnectivityClass::Unmetered => self.settings.max_bitrate_wifi,
        }
    }

    /// Map `(logical index, song)` pairs to engine tracks, in order.
    pub async fn map_songs(&self, songs: &[(usize, Song)]) -> Result<Vec<EngineTrack>> {
        let (server_id, client) = self.active_client()?;
        let just_songs: Vec<Song> = songs.iter().map(|(_, s)| s.clone()).collect();

        // Without a fence the lookup can never be superseded
        let artwork = self
            .cover_art_paths(&server_id, client.as_ref(), &just_songs, false, None)
            .await
            .current()
            .unwrap_or_default();

        let max_bitrate = self.max_bitrate();
        let mut tracks = Vec::with_capacity(songs.len());
        for (idx, song) in songs {
            let url = match self.local_file(&server_id, &song.id).await {
                Some(path) => path,
                None => client.stream_uri(&song.id, max_bitrate, true),
            };
            let album_id = song.album_id.clone();
            let artwork_path = album_id.as_ref().and_then(|id| artwork.get(id)).cloned();
            let cover_art = album_id.as_ref().and_then(|id| {
                self.resolver
                    .query()
                    .get::<Option<String>>(&server_id, &CacheKey::album_cover_art(id))
                    .flatten()
            });

            tracks.push(EngineTrack {
                idx: *idx,
                id: song.id.clone(),
                url,
                title: song.title.clone(),
                artist: song.artist_or_unknown().to_string(),
                album: song.album_or_unknown().to_string(),
                artwork: artwork_path,
                duration: song.duration(),
                cover_art,
                artist_id: song.artist_id.clone(),
                album_id,
                track: song.track,
                disc_number: song.disc_number,
            });
        }
        Ok(tracks)
    }

    async fn local_file(&self, server_id: &str, song_id: &str) -> Option<String> {
        match self.resolver.offline().song_path(server_id, song_id).await {
            Ok(path) => path,
            Err(e) => {
                warn!(song_id, error = %e, "Offline cache lookup failed, streaming instead");
                None
            }
        }
    }

    /// Resolve and download missing thumbnails for every album in the
    /// current session's queue.
    ///
    /// Returns the number of albums with artwork, or `Superseded` if the
    /// session changed while resolving.
    #[instrument(skip(self, fence), fields(context_id = %fence.context_id()))]
    pub async fn fetch_queue_artwork(&self, fence: &ContextFence) -> Result<Fenced<usize>> {
        let Some(queue) = self.store.with_session(|s| s.queue.clone()) else {
            return Ok(Fenced::Superseded);
        };
        if !fence.holds(&self.store) {
            return Ok(Fenced::Superseded);
        }

        let (server_id, client) = self.active_client()?;
        let paths = self
            .cover_art_paths(&server_id, client.as_ref(), &queue, true, Some(fence))
            .await;

        Ok(match paths {
            Fenced::Current(paths) => Fenced::Current(paths.len()),
            Fenced::Superseded => Fenced::Superseded,
        })
    }

    async fn cover_art_paths(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        songs: &[Song],
        fetch_missing: bool,
        fence: Option<&ContextFence>,
    ) -> Fenced<ArtworkPaths> {
        let superseded = || fence.map_or(false, |f| !f.holds(&self.store));

        let mut seen = HashSet::new();
        let album_ids: Vec<&str> = songs
            .iter()
            .filter_map(|s| s.album_id.as_deref())
            .filter(|id| seen.insert(*id))
            .collect();

        let mut paths = ArtworkPaths::new();
        for album_id in album_ids {
            let known = self
                .resolver
                .query()
                .get::<Option<String>>(server_id, &CacheKey::album_cover_art(album_id))
                .flatten();

            let cover_art = match known {
                Some(cover_art) => cover_art,
                None => {
                    if superseded() {
                        return Fenced::Superseded;
                    }
                    debug!(album_id, "No cached cover art id, resolving album");
                    match self.resolver.album_cover_art(server_id, client, album_id).await {
                        Ok(Some(cover_art)) => cover_art,
                        Ok(None) => continue,
                        Err(e) => {
                            debug!(album_id, error = %e, "Album lookup for artwork failed");
                            continue;
                        }
                    }
                }
            };

            let mut image_path = self.resolver.cached_cover_art_thumb(server_id, &cover_art);
            if image_path.is_none() && fetch_missing {
                if superseded() {
                    return Fenced::Superseded;
                }
                debug!(cover_art = %cover_art, "No cached thumbnail, fetching");
                image_path = match self
                    .resolver
                    .cover_art_file(server_id, client, &cover_art, ImageSize::Thumbnail)
                    .await
                {
                    Ok(path) => Some(path),
                    Err(e) => {
                        debug!(cover_art = %cover_art, error = %e, "Thumbnail fetch failed");
                        None
                    }
                };
            }

            if let Some(path) = image_path {
                paths.insert(album_id.to_string(), path);
            }
        }

        Fenced::Current(paths)
    }
}
