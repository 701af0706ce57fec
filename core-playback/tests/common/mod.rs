//! Shared fakes for the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::SqliteKeyValueStore;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{AudioEngine, EngineTrack, PlayerOptions, PlayerState};
use bridge_traits::storage::{FetchFileRequest, FileFetcher, FileKind, ProgressCallback};
use core_library::cache::{OfflineCache, QueryCache};
use core_library::catalog::{CatalogClient, StaticCatalogProvider};
use core_library::error::{LibraryError, Result as LibraryResult};
use core_library::models::{
    Album, AlbumSongs, ArtistAlbums, ArtistInfo, ImageSize, PlaylistSongs, QueueType, Song,
};
use core_library::resolver::CatalogResolver;
use core_playback::dispatcher::{self, DomainEventReceiver};
use core_playback::session::{Session, SessionRequest};
use core_playback::{PlayerController, PlayerStore, TrackMapper};
use core_runtime::config::PlaybackSettings;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const SERVER_ID: &str = "srv-1";

// ============================================================================
// Fake Audio Engine
// ============================================================================

#[derive(Debug, Default)]
struct EngineState {
    tracks: Vec<EngineTrack>,
    pointer: Option<usize>,
    state: PlayerState,
    mutations: usize,
    setups: usize,
    destroys: usize,
    resets: usize,
    seeks: Vec<Duration>,
    calls: Vec<&'static str>,
}

/// In-memory engine that shifts its pointer the way a native player does
/// when tracks are inserted or removed before it.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Song ids currently loaded, in slot order.
    pub fn window_ids(&self) -> Vec<String> {
        self.state.lock().tracks.iter().map(|t| t.id.clone()).collect()
    }

    /// Logical indices currently loaded, in slot order.
    pub fn window_indices(&self) -> Vec<usize> {
        self.state.lock().tracks.iter().map(|t| t.idx).collect()
    }

    pub fn tracks(&self) -> Vec<EngineTrack> {
        self.state.lock().tracks.clone()
    }

    pub fn pointer(&self) -> Option<usize> {
        self.state.lock().pointer
    }

    pub fn player_state(&self) -> PlayerState {
        self.state.lock().state
    }

    pub fn mutations(&self) -> usize {
        self.state.lock().mutations
    }

    pub fn setups(&self) -> usize {
        self.state.lock().setups
    }

    pub fn destroys(&self) -> usize {
        self.state.lock().destroys
    }

    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.state.lock().seeks.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Move the pointer as if playback advanced on its own.
    pub fn advance(&self) {
        let mut state = self.state.lock();
        state.pointer = state.pointer.map(|p| p + 1);
    }

    /// Force an arbitrary window shape.
    pub fn load(&self, tracks: Vec<EngineTrack>, pointer: Option<usize>) {
        let mut state = self.state.lock();
        state.tracks = tracks;
        state.pointer = pointer;
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn setup(&self, _options: PlayerOptions) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("setup");
        state.setups += 1;
        Ok(())
    }

    async fn add(&self, tracks: Vec<EngineTrack>, insert_before: Option<usize>) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("add");
        state.mutations += 1;
        let count = tracks.len();
        match insert_before {
            Some(at) => {
                let at = at.min(state.tracks.len());
                for (offset, track) in tracks.into_iter().enumerate() {
                    state.tracks.insert(at + offset, track);
                }
                if let Some(pointer) = state.pointer {
                    if pointer >= at {
                        state.pointer = Some(pointer + count);
                    }
                }
            }
            None => state.tracks.extend(tracks),
        }
        if state.pointer.is_none() && !state.tracks.is_empty() {
            state.pointer = Some(0);
        }
        Ok(())
    }

    async fn remove(&self, mut indices: Vec<usize>) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("remove");
        state.mutations += 1;
        indices.sort_unstable_by(|a, b| b.cmp(a));
        for index in indices {
            if index >= state.tracks.len() {
                return Err(BridgeError::OperationFailed(format!(
                    "no track at {index}"
                )));
            }
            state.tracks.remove(index);
            if let Some(pointer) = state.pointer {
                if pointer > index {
                    state.pointer = Some(pointer - 1);
                }
            }
        }
        if state.tracks.is_empty() {
            state.pointer = None;
        }
        Ok(())
    }

    async fn update_metadata(&self, index: usize, track: EngineTrack) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("update_metadata");
        state.mutations += 1;
        match state.tracks.get_mut(index) {
            Some(slot) => {
                *slot = track;
                Ok(())
            }
            None => Err(BridgeError::OperationFailed(format!("no track at {index}"))),
        }
    }

    async fn skip_to_next(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("skip_to_next");
        match state.pointer {
            Some(p) if p + 1 < state.tracks.len() => {
                state.pointer = Some(p + 1);
                Ok(())
            }
            _ => Err(BridgeError::OperationFailed("no next track".into())),
        }
    }

    async fn skip_to_previous(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("skip_to_previous");
        match state.pointer {
            Some(p) if p > 0 => {
                state.pointer = Some(p - 1);
                Ok(())
            }
            _ => Err(BridgeError::OperationFailed("no previous track".into())),
        }
    }

    async fn seek_to(&self, position: Duration) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("seek_to");
        state.seeks.push(position);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("play");
        state.state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("pause");
        state.state = PlayerState::Paused;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("stop");
        state.state = PlayerState::Stopped;
        Ok(())
    }

    async fn reset(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("reset");
        state.resets += 1;
        state.tracks.clear();
        state.pointer = None;
        state.state = PlayerState::None;
        Ok(())
    }

    async fn destroy(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("destroy");
        state.destroys += 1;
        state.tracks.clear();
        state.pointer = None;
        state.state = PlayerState::None;
        Ok(())
    }

    async fn get_queue(&self) -> BridgeResult<Vec<EngineTrack>> {
        Ok(self.state.lock().tracks.clone())
    }

    async fn get_current_index(&self) -> BridgeResult<Option<usize>> {
        Ok(self.state.lock().pointer)
    }

    async fn get_state(&self) -> BridgeResult<PlayerState> {
        Ok(self.state.lock().state)
    }
}

// ============================================================================
// Fake Catalog
// ============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    albums: Mutex<HashMap<String, AlbumSongs>>,
    album_fetches: Mutex<usize>,
    scrobbles: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_album(&self, album: Album, songs: Vec<Song>) {
        self.albums
            .lock()
            .insert(album.id.clone(), AlbumSongs { album, songs });
    }

    pub fn album_fetches(&self) -> usize {
        *self.album_fetches.lock()
    }

    pub fn scrobbles(&self) -> Vec<String> {
        self.scrobbles.lock().clone()
    }
}

fn not_found(entity_type: &str, id: &str) -> LibraryError {
    LibraryError::NotFound {
        entity_type: entity_type.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_song(&self, id: &str) -> LibraryResult<Song> {
        Err(not_found("song", id))
    }

    async fn fetch_album(&self, id: &str) -> LibraryResult<AlbumSongs> {
        *self.album_fetches.lock() += 1;
        self.albums
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("album", id))
    }

    async fn fetch_artist(&self, id: &str) -> LibraryResult<ArtistAlbums> {
        Err(not_found("artist", id))
    }

    async fn fetch_artist_info(&self, id: &str) -> LibraryResult<ArtistInfo> {
        Err(not_found("artistInfo", id))
    }

    async fn fetch_playlist(&self, id: &str) -> LibraryResult<PlaylistSongs> {
        Err(not_found("playlist", id))
    }

    async fn scrobble(&self, id: &str) -> LibraryResult<()> {
        self.scrobbles.lock().push(id.to_string());
        Ok(())
    }

    fn stream_uri(&self, id: &str, max_bitrate: u32, estimate_content_length: bool) -> String {
        format!(
            "https://music.test/rest/stream?id={id}&maxBitRate={max_bitrate}&estimateContentLength={estimate_content_length}"
        )
    }

    fn download_uri(&self, id: &str) -> String {
        format!("https://music.test/rest/download?id={id}")
    }

    fn cover_art_uri(&self, cover_art: &str, size: ImageSize) -> String {
        format!("https://music.test/rest/getCoverArt?id={cover_art}&size={size}")
    }
}

// ============================================================================
// Fake File Fetcher
// ============================================================================

#[derive(Default)]
pub struct FakeFetcher {
    fetched: Mutex<Vec<(FileKind, String)>>,
}

impl FakeFetcher {
    pub fn fetched(&self) -> Vec<(FileKind, String)> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl FileFetcher for FakeFetcher {
    async fn fetch_file(
        &self,
        server_id: &str,
        request: FetchFileRequest,
        _on_progress: Option<ProgressCallback>,
    ) -> BridgeResult<PathBuf> {
        self.fetched.lock().push((request.kind, request.id.clone()));
        Ok(PathBuf::from(format!(
            "/files/{server_id}/{}/{}",
            request.kind.as_str(),
            request.id
        )))
    }

    async fn fetch_existing_file(
        &self,
        _server_id: &str,
        _kind: FileKind,
        _id: &str,
    ) -> BridgeResult<Option<PathBuf>> {
        Ok(None)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub catalog: Arc<FakeCatalog>,
    pub fetcher: Arc<FakeFetcher>,
    pub offline: OfflineCache,
    pub store: Arc<PlayerStore>,
    pub mapper: Arc<TrackMapper>,
    pub bus: EventBus,
    pub controller: PlayerController,
    pub inbox: DomainEventReceiver,
}

pub async fn harness() -> Harness {
    harness_with(PlaybackSettings::default()).await
}

pub async fn harness_with(settings: PlaybackSettings) -> Harness {
    let engine = Arc::new(FakeEngine::new());
    let catalog = Arc::new(FakeCatalog::new());
    let fetcher = Arc::new(FakeFetcher::default());

    let provider = Arc::new(StaticCatalogProvider::new());
    provider.register(SERVER_ID, catalog.clone());
    provider.set_active(Some(SERVER_ID.to_string()));

    let kv = SqliteKeyValueStore::in_memory()
        .await
        .expect("in-memory store");
    let offline = OfflineCache::new(Arc::new(kv));
    let resolver = CatalogResolver::new(
        offline.clone(),
        Arc::new(QueryCache::default()),
        fetcher.clone(),
    );

    let store = Arc::new(PlayerStore::new());
    let mapper = Arc::new(TrackMapper::new(
        Arc::clone(&store),
        provider,
        resolver,
        settings,
    ));
    let bus = EventBus::new(256);
    let (events, inbox) = dispatcher::channel();
    let controller = PlayerController::new(
        engine.clone(),
        Arc::clone(&store),
        Arc::clone(&mapper),
        bus.clone(),
        events,
    );
    controller.seed_shuffle(7);

    Harness {
        engine,
        catalog,
        fetcher,
        offline,
        store,
        mapper,
        bus,
        controller,
        inbox,
    }
}

/// `count` songs with ids `s0..`, no album.
pub fn songs(count: usize) -> Vec<Song> {
    (0..count)
        .map(|i| Song::new(format!("s{i}"), format!("Song {i}")))
        .collect()
}

pub fn request(count: usize, play_index: usize) -> SessionRequest {
    SessionRequest::new(songs(count), "Album", QueueType::Album, "al-1")
        .play_index(play_index)
        .shuffle(false)
}

/// Install a session directly, bypassing the controller.
pub fn install_session(store: &PlayerStore, count: usize, current: usize) {
    let mut rng = StdRng::seed_from_u64(0);
    let session = Session::create(request(count, current), false, &mut rng)
        .expect("valid request");
    store.replace_session(session);
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
