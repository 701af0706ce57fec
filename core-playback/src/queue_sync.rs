//! # Queue Sync Engine
//!
//! Reconciles the logical queue into the audio engine's three-slot window.
//!
//! ## Overview
//!
//! The engine holds at most `[previous, current, next]` with its own pointer.
//! After a successful sync the window holds exactly three tracks with the
//! pointer on the middle slot, which plays `queue[current_index]`.
//!
//! | Engine state              | Action                                           |
//! |---------------------------|--------------------------------------------------|
//! | more than 3 slots         | another mutation is in flight; do nothing         |
//! | 3 slots, pointer 1        | already synced (unless rebuilding)               |
//! | empty                     | add `[current, next]`, then previous at slot 0   |
//! | rebuild requested         | patch metadata under the pointer, replace others |
//! | pointer 2                 | engine stepped forward: append next, drop slot 0 |
//! | pointer 0                 | engine stepped back: prepend previous, drop slot 3 |
//! | anything else             | [`PlaybackError::EngineDesync`], window untouched |
//!
//! Every call must run inside the command serializer so the read of the
//! engine state and the mutations that follow are atomic with respect to
//! other engine calls.

use crate::error::{PlaybackError, Result};
use crate::store::PlayerStore;
use crate::track_mapper::TrackMapper;
use bridge_traits::playback::AudioEngine;
use core_library::models::Song;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};

const WINDOW_LEN: usize = 3;
const CENTER_SLOT: usize = 1;

/// What a sync pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing is playing.
    NoSession,
    /// The engine holds more than three slots; a prior mutation has not
    /// settled. The events it produces will trigger another sync.
    Busy,
    AlreadySynced,
    /// Filled an empty engine.
    Initialized,
    /// Replaced both neighbors around the playing slot.
    Rebuilt,
    /// Shifted the window after the engine advanced one slot.
    AdvancedForward,
    /// Shifted the window after the engine went back one slot.
    MovedBackward,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::NoSession => "no_session",
            SyncOutcome::Busy => "busy",
            SyncOutcome::AlreadySynced => "already_synced",
            SyncOutcome::Initialized => "initialized",
            SyncOutcome::Rebuilt => "rebuilt",
            SyncOutcome::AdvancedForward => "advanced_forward",
            SyncOutcome::MovedBackward => "moved_backward",
        }
    }

    /// Whether the engine was mutated.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Initialized
                | SyncOutcome::Rebuilt
                | SyncOutcome::AdvancedForward
                | SyncOutcome::MovedBackward
        )
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct QueueSync {
    engine: Arc<dyn AudioEngine>,
    store: Arc<PlayerStore>,
    mapper: Arc<TrackMapper>,
}

impl QueueSync {
    pub fn new(engine: Arc<dyn AudioEngine>, store: Arc<PlayerStore>, mapper: Arc<TrackMapper>) -> Self {
        Self {
            engine,
            store,
            mapper,
        }
    }

    /// Bring the engine window in line with the session.
    ///
    /// `rebuild` forces both neighbors to be replaced even when the window
    /// already looks synced, e.g. after the repeat mode or shuffle changed.
    #[instrument(skip(self))]
    pub async fn sync(&self, rebuild: bool) -> Result<SyncOutcome> {
        let engine_len = self.engine.get_queue().await?.len();
        if engine_len > WINDOW_LEN {
            debug!(engine_len, "Engine queue is being modified, skipping sync");
            return Ok(SyncOutcome::Busy);
        }

        let pointer = self.engine.get_current_index().await?;

        let Some((queue_len, current, prev, next, songs)) = self.window_songs() else {
            return Ok(SyncOutcome::NoSession);
        };

        if engine_len == WINDOW_LEN && pointer == Some(CENTER_SLOT) && !rebuild {
            debug!("Engine window already synced");
            return Ok(SyncOutcome::AlreadySynced);
        }

        let _lock = self.store.lock_queue();
        let [prev_song, current_song, next_song] = songs;

        let outcome = match (engine_len, pointer) {
            (0, None) => {
                debug!(prev, current, next, "Adding initial tracks");
                let mut tracks = self
                    .mapper
                    .map_songs(&[(prev, prev_song), (current, current_song), (next, next_song)])
                    .await?
                    .into_iter();
                let (Some(prev_track), Some(current_track), Some(next_track)) =
                    (tracks.next(), tracks.next(), tracks.next())
                else {
                    return Err(self.desync(engine_len, pointer, queue_len));
                };

                self.engine.add(vec![current_track, next_track], None).await?;
                self.engine.add(vec![prev_track], Some(0)).await?;
                SyncOutcome::Initialized
            }
            (WINDOW_LEN, Some(slot)) if rebuild && slot < WINDOW_LEN => {
                debug!(slot, prev, current, next, "Rebuilding window around current");
                let mut tracks = self
                    .mapper
                    .map_songs(&[(prev, prev_song), (current, current_song), (next, next_song)])
                    .await?
                    .into_iter();
                let (Some(prev_track), Some(current_track), Some(next_track)) =
                    (tracks.next(), tracks.next(), tracks.next())
                else {
                    return Err(self.desync(engine_len, pointer, queue_len));
                };

                self.engine.update_metadata(slot, current_track).await?;
                let stale: Vec<usize> = (0..WINDOW_LEN).filter(|&i| i != slot).collect();
                self.engine.remove(stale).await?;
                self.engine.add(vec![next_track], None).await?;
                self.engine.add(vec![prev_track], Some(0)).await?;
                SyncOutcome::Rebuilt
            }
            (WINDOW_LEN, Some(2)) => {
                debug!(next, "Adding next track");
                let tracks = self.mapper.map_songs(&[(next, next_song)]).await?;
                self.engine.add(tracks, None).await?;
                self.engine.remove(vec![0]).await?;
                SyncOutcome::AdvancedForward
            }
            (WINDOW_LEN, Some(0)) => {
                debug!(prev, "Adding previous track");
                let tracks = self.mapper.map_songs(&[(prev, prev_song)]).await?;
                self.engine.add(tracks, Some(0)).await?;
                self.engine.remove(vec![WINDOW_LEN]).await?;
                SyncOutcome::MovedBackward
            }
            _ => return Err(self.desync(engine_len, pointer, queue_len)),
        };

        Ok(outcome)
    }

    /// Logical indices and songs for `[previous, current, next]`.
    #[allow(clippy::type_complexity)]
    fn window_songs(&self) -> Option<(usize, usize, usize, usize, [Song; 3])> {
        let repeat = self.store.repeat_mode();
        self.store.with_session(|session| {
            let current = session.current_index;
            let (prev, next) = session.neighbors(repeat);
            let songs = [
                session.queue[prev].clone(),
                session.queue[current].clone(),
                session.queue[next].clone(),
            ];
            (session.queue.len(), current, prev, next, songs)
        })
    }

    fn desync(&self, engine_len: usize, pointer: Option<usize>, logical_len: usize) -> PlaybackError {
        error!(
            engine_len,
            pointer = ?pointer,
            logical_len,
            "Engine window desynced from session"
        );
        PlaybackError::EngineDesync {
            queue_len: engine_len,
            current_index: pointer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::SqliteKeyValueStore;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::playback::{EngineTrack, PlayerOptions, PlayerState};
    use bridge_traits::storage::{FetchFileRequest, FileFetcher, FileKind, ProgressCallback};
    use core_library::cache::{OfflineCache, QueryCache};
    use core_library::catalog::{CatalogClient, StaticCatalogProvider};
    use core_library::error::Result as LibraryResult;
    use core_library::models::{
        AlbumSongs, ArtistAlbums, ArtistInfo, ImageSize, PlaylistSongs, QueueType,
    };
    use core_library::resolver::CatalogResolver;
    use core_runtime::config::PlaybackSettings;
    use crate::session::{Session, SessionRequest};
    use mockall::mock;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;
    use std::time::Duration;

    mock! {
        pub Engine {}

        #[async_trait]
        impl AudioEngine for Engine {
            async fn setup(&self, options: PlayerOptions) -> BridgeResult<()>;
            async fn add(&self, tracks: Vec<EngineTrack>, insert_before: Option<usize>) -> BridgeResult<()>;
            async fn remove(&self, indices: Vec<usize>) -> BridgeResult<()>;
            async fn update_metadata(&self, index: usize, track: EngineTrack) -> BridgeResult<()>;
            async fn skip_to_next(&self) -> BridgeResult<()>;
            async fn skip_to_previous(&self) -> BridgeResult<()>;
            async fn seek_to(&self, position: Duration) -> BridgeResult<()>;
            async fn play(&self) -> BridgeResult<()>;
            async fn pause(&self) -> BridgeResult<()>;
            async fn stop(&self) -> BridgeResult<()>;
            async fn reset(&self) -> BridgeResult<()>;
            async fn destroy(&self) -> BridgeResult<()>;
            async fn get_queue(&self) -> BridgeResult<Vec<EngineTrack>>;
            async fn get_current_index(&self) -> BridgeResult<Option<usize>>;
            async fn get_state(&self) -> BridgeResult<PlayerState>;
        }
    }

    mock! {
        pub Catalog {}

        #[async_trait]
        impl CatalogClient for Catalog {
            async fn fetch_song(&self, id: &str) -> LibraryResult<Song>;
            async fn fetch_album(&self, id: &str) -> LibraryResult<AlbumSongs>;
            async fn fetch_artist(&self, id: &str) -> LibraryResult<ArtistAlbums>;
            async fn fetch_artist_info(&self, id: &str) -> LibraryResult<ArtistInfo>;
            async fn fetch_playlist(&self, id: &str) -> LibraryResult<PlaylistSongs>;
            async fn scrobble(&self, id: &str) -> LibraryResult<()>;
            fn stream_uri(&self, id: &str, max_bitrate: u32, estimate_content_length: bool) -> String;
            fn download_uri(&self, id: &str) -> String;
            fn cover_art_uri(&self, cover_art: &str, size: ImageSize) -> String;
        }
    }

    mock! {
        pub Fetcher {}

        #[async_trait]
        impl FileFetcher for Fetcher {
            async fn fetch_file(
                &self,
                server_id: &str,
                request: FetchFileRequest,
                on_progress: Option<ProgressCallback>,
            ) -> BridgeResult<PathBuf>;
            async fn fetch_existing_file(
                &self,
                server_id: &str,
                kind: FileKind,
                id: &str,
            ) -> BridgeResult<Option<PathBuf>>;
        }
    }

    async fn queue_sync(engine: MockEngine) -> (QueueSync, Arc<PlayerStore>) {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stream_uri()
            .returning(|id, bitrate, _| format!("https://music.test/stream?id={id}&maxBitRate={bitrate}"));
        let provider = Arc::new(StaticCatalogProvider::new());
        provider.register("srv", Arc::new(catalog));
        provider.set_active(Some("srv".to_string()));

        let kv = SqliteKeyValueStore::in_memory().await.unwrap();
        let resolver = CatalogResolver::new(
            OfflineCache::new(Arc::new(kv)),
            Arc::new(QueryCache::default()),
            Arc::new(MockFetcher::new()),
        );

        let store = Arc::new(PlayerStore::new());
        let songs = (0..4)
            .map(|i| Song::new(format!("s{i}"), format!("Song {i}")))
            .collect();
        let request = SessionRequest::new(songs, "Album", QueueType::Album, "al-1")
            .play_index(1)
            .shuffle(false);
        let session = Session::create(request, false, &mut StdRng::seed_from_u64(1)).unwrap();
        store.replace_session(session);

        let mapper = Arc::new(TrackMapper::new(
            Arc::clone(&store),
            provider,
            resolver,
            PlaybackSettings::default(),
        ));
        (
            QueueSync::new(Arc::new(engine), Arc::clone(&store), mapper),
            store,
        )
    }

    #[tokio::test]
    async fn test_unreadable_engine_queue_mutates_nothing() {
        let mut engine = MockEngine::new();
        engine
            .expect_get_queue()
            .times(1)
            .returning(|| Err(BridgeError::OperationFailed("player gone".into())));
        engine.expect_get_current_index().never();
        engine.expect_add().never();
        engine.expect_remove().never();

        let (sync, store) = queue_sync(engine).await;

        let err = sync.sync(false).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Engine(_)));
        assert!(!store.is_queue_locked());
    }

    #[tokio::test]
    async fn test_failed_add_releases_queue_lock() {
        let mut engine = MockEngine::new();
        engine.expect_get_queue().returning(|| Ok(Vec::new()));
        engine.expect_get_current_index().returning(|| Ok(None));
        engine
            .expect_add()
            .withf(|tracks, insert_before| {
                tracks.iter().map(|t| t.idx).collect::<Vec<_>>() == vec![1, 2]
                    && insert_before.is_none()
            })
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("rejected".into())));

        let (sync, store) = queue_sync(engine).await;

        assert!(sync.sync(false).await.is_err());
        assert!(!store.is_queue_locked());
    }
}
