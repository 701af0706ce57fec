//! # Download Pipeline
//!
//! Resolves everything a song needs for offline playback and writes it to
//! the server's offline cache.
//!
//! ## Stages
//!
//! 1. Song, and the playlist when requested from one, fetched concurrently.
//! 2. Abort if the song has no album id.
//! 3. Album, plus artist and artist info when the song has an artist id,
//!    fetched concurrently.
//! 4. Cover art and artist art at both sizes. Best effort: failures are
//!    logged and never fail the job.
//! 5. The audio file, with byte progress recorded on the job.
//! 6. Song, song path, album, artist, artist info and playlist written to the
//!    offline cache.
//!
//! Every lookup goes through the [`CatalogResolver`], so stages 1 and 3 read
//! the offline cache and the query cache before touching the network. Nothing
//! is written to the offline cache before stage 6.

use crate::error::{DownloadError, Result};
use crate::job::{DownloadJob, DownloadJobId, DownloadQueues};
use bridge_traits::storage::{FetchFileRequest, FileKind, ProgressCallback};
use core_library::cache::CacheKey;
use core_library::catalog::CatalogClient;
use core_library::error::Result as LibraryResult;
use core_library::models::{AlbumSongs, ArtistAlbums, ArtistInfo, ImageSize, PlaylistSongs, Song};
use core_library::resolver::CatalogResolver;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::strip_path;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const AUDIO_CONTENT_TYPE: &str = "audio";

type SongAndPlaylist = (Song, Option<PlaylistSongs>);
type AlbumAndArtist = (AlbumSongs, Option<ArtistAlbums>, Option<ArtistInfo>);

/// Runs a single job's stages. Cheap to clone into each queued job.
#[derive(Clone)]
pub struct DownloadPipeline {
    resolver: CatalogResolver,
    queues: Arc<DownloadQueues>,
    event_bus: Option<EventBus>,
}

impl DownloadPipeline {
    pub fn new(resolver: CatalogResolver, queues: Arc<DownloadQueues>) -> Self {
        Self {
            resolver,
            queues,
            event_bus: None,
        }
    }

    /// Publish audio progress as [`DownloadEvent::Progress`].
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Run every stage for a queued job.
    ///
    /// Returns `Ok(())` without doing anything if the job is no longer
    /// queued.
    #[instrument(skip(self, client), fields(job = %id))]
    pub async fn run(&self, id: &DownloadJobId, client: &dyn CatalogClient) -> Result<()> {
        let Some(job) = self.queues.get(id) else {
            debug!("Job no longer queued");
            return Ok(());
        };
        let server_id = id.server_id.as_str();

        let (song, playlist) = self.fetch_song(server_id, client, &job).await?;
        self.queues.update(id, |job| {
            job.song = Some(song.clone());
            job.playlist = playlist.clone();
        });

        let Some(album_id) = song.album_id.as_deref() else {
            return Err(DownloadError::MissingAlbumId {
                song_id: song.id.clone(),
            });
        };

        let (album, artist, artist_info) = self
            .fetch_album(server_id, client, album_id, song.artist_id.as_deref())
            .await?;
        self.queues.update(id, |job| {
            job.album = Some(album.clone());
            job.artist = artist.clone();
            job.artist_info = artist_info.clone();
        });

        self.cache_artwork(server_id, client, &album, artist.as_ref(), artist_info.as_ref())
            .await;

        let path = self.fetch_audio(id, client).await?;

        self.persist(
            server_id,
            &song,
            &path,
            &album,
            artist.as_ref(),
            artist_info.as_ref(),
            playlist.as_ref(),
        )
        .await?;

        info!(file = %strip_path(&path), "Song downloaded");
        Ok(())
    }

    #[instrument(skip(self, client, job))]
    async fn fetch_song(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        job: &DownloadJob,
    ) -> Result<SongAndPlaylist> {
        let song = self.resolver.song(server_id, client, job.song_id());
        let playlist = async {
            match job.playlist_id.as_deref() {
                Some(playlist_id) => self
                    .resolver
                    .playlist(server_id, client, playlist_id)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        Ok(futures::try_join!(song, playlist)?)
    }

    #[instrument(skip(self, client))]
    async fn fetch_album(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        album_id: &str,
        artist_id: Option<&str>,
    ) -> Result<AlbumAndArtist> {
        let album = self.resolver.album(server_id, client, album_id);
        let artist = async {
            match artist_id {
                Some(id) => self.resolver.artist(server_id, client, id).await.map(Some),
                None => Ok(None),
            }
        };
        let artist_info = async {
            match artist_id {
                Some(id) => self
                    .resolver
                    .artist_info(server_id, client, id)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        Ok(futures::try_join!(album, artist, artist_info)?)
    }

    #[instrument(skip_all)]
    async fn cache_artwork(
        &self,
        server_id: &str,
        client: &dyn CatalogClient,
        album: &AlbumSongs,
        artist: Option<&ArtistAlbums>,
        artist_info: Option<&ArtistInfo>,
    ) {
        let cover_art = album.album.cover_art_or_placeholder();
        let artist_art = move |size: ImageSize| {
            let artist_id = artist.map(|a| a.artist.id.as_str());
            let url = artist_info.and_then(|info| info.image_url(size));
            async move {
                if let (Some(artist_id), Some(url)) = (artist_id, url) {
                    best_effort(
                        "artist art",
                        artist_id,
                        self.resolver.artist_art_file(server_id, artist_id, size, url),
                    )
                    .await;
                }
            }
        };

        futures::join!(
            best_effort(
                "cover art thumbnail",
                cover_art,
                self.resolver
                    .cover_art_file(server_id, client, cover_art, ImageSize::Thumbnail),
            ),
            best_effort(
                "cover art",
                cover_art,
                self.resolver
                    .cover_art_file(server_id, client, cover_art, ImageSize::Original),
            ),
            artist_art(ImageSize::Thumbnail),
            artist_art(ImageSize::Original),
        );
    }

    #[instrument(skip(self, client))]
    async fn fetch_audio(&self, id: &DownloadJobId, client: &dyn CatalogClient) -> Result<String> {
        let request = FetchFileRequest::new(
            FileKind::Song,
            &id.song_id,
            client.download_uri(&id.song_id),
            AUDIO_CONTENT_TYPE,
        )
        .without_cache_buster();

        let path = self
            .resolver
            .fetcher()
            .fetch_file(&id.server_id, request, Some(self.progress_callback(id)))
            .await?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn progress_callback(&self, id: &DownloadJobId) -> ProgressCallback {
        let queues = Arc::clone(&self.queues);
        let event_bus = self.event_bus.clone();
        let id = id.clone();
        Arc::new(move |received, total| {
            queues.update(&id, |job| job.record_progress(received, total));
            if let Some(bus) = &event_bus {
                bus.emit(CoreEvent::Download(DownloadEvent::Progress {
                    server_id: id.server_id.clone(),
                    song_id: id.song_id.clone(),
                    received,
                    total,
                }))
                .ok();
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all)]
    async fn persist(
        &self,
        server_id: &str,
        song: &Song,
        path: &str,
        album: &AlbumSongs,
        artist: Option<&ArtistAlbums>,
        artist_info: Option<&ArtistInfo>,
        playlist: Option<&PlaylistSongs>,
    ) -> Result<()> {
        let offline = self.resolver.offline();
        offline.set(server_id, &CacheKey::song(&song.id), song).await?;
        offline
            .set(server_id, &CacheKey::song_path(&song.id), path)
            .await?;
        offline
            .set(server_id, &CacheKey::album(&album.album.id), album)
            .await?;
        if let Some(artist) = artist {
            offline
                .set(server_id, &CacheKey::artist(&artist.artist.id), artist)
                .await?;
        }
        if let Some(info) = artist_info {
            offline
                .set(server_id, &CacheKey::artist_info(&info.id), info)
                .await?;
        }
        if let Some(playlist) = playlist {
            offline
                .set(server_id, &CacheKey::playlist(&playlist.playlist.id), playlist)
                .await?;
        }
        Ok(())
    }
}

async fn best_effort(
    what: &'static str,
    id: &str,
    fetch: impl Future<Output = LibraryResult<String>>,
) {
    match fetch.await {
        Ok(path) => debug!(what, id, file = %strip_path(&path), "Artwork cached"),
        Err(e) => warn!(what, id, error = %e, "Artwork fetch failed, continuing"),
    }
}
