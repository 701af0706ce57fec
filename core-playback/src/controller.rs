//! # Playback Session Controller
//!
//! Turns user intents and engine callbacks into serialized engine calls.
//!
//! ## Overview
//!
//! Every intent (`play`, `skip`, `toggle_shuffle`, ...) and every engine
//! callback that touches the engine runs as a job on the `engine`
//! [`SerialQueue`], so no two engine call sequences ever interleave. Intents
//! wait for their job; callbacks routed through the
//! [`EventDispatcher`](crate::dispatcher::EventDispatcher) only enqueue.
//!
//! Job failures are logged at the job boundary and published as
//! [`PlaybackEvent::Error`]. After every job the controller checks whether
//! the song under the pointer changed and, if so, publishes
//! [`PlaybackEvent::CurrentTrackChanged`] and notifies the dispatcher, which
//! drives scrobbling.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let controller = PlayerController::new(engine, store, mapper, bus, events);
//! controller
//!     .create_session(SessionRequest::new(songs, "Album", QueueType::Album, "al-1").play_index(3))
//!     .await?;
//! controller.toggle_shuffle().await?;
//! ```

use crate::dispatcher::{DomainEvent, DomainEventSender};
use crate::error::{PlaybackError, Result};
use crate::fence::{ContextFence, Fenced};
use crate::queue_sync::{QueueSync, SyncOutcome};
use crate::session::{RepeatMode, Session, SessionRequest};
use crate::store::PlayerStore;
use crate::track_mapper::TrackMapper;
use bridge_traits::network::ConnectivityClass;
use bridge_traits::playback::{AudioEngine, EngineEvent, PlayerState, Progress};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::queue::SerialQueue;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How long a seek holds progress reports before they apply again.
pub const PROGRESS_HOLD: Duration = Duration::from_millis(501);

/// Engine error code for a failed source load.
const SOURCE_ERROR_CODE: &str = "playback-source";

struct Inner {
    engine: Arc<dyn AudioEngine>,
    store: Arc<PlayerStore>,
    mapper: Arc<TrackMapper>,
    sync: QueueSync,
    commands: SerialQueue,
    events: EventBus,
    domain: DomainEventSender,
    rng: Mutex<StdRng>,
}

/// Cloneable handle to the playback controller.
#[derive(Clone)]
pub struct PlayerController {
    inner: Arc<Inner>,
}

impl PlayerController {
    /// Create a controller and start its command serializer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        store: Arc<PlayerStore>,
        mapper: Arc<TrackMapper>,
        events: EventBus,
        domain: DomainEventSender,
    ) -> Self {
        let sync = QueueSync::new(Arc::clone(&engine), Arc::clone(&store), Arc::clone(&mapper));
        Self {
            inner: Arc::new(Inner {
                engine,
                store,
                mapper,
                sync,
                commands: SerialQueue::new("engine"),
                events,
                domain,
                rng: Mutex::new(StdRng::from_entropy()),
            }),
        }
    }

    /// Make shuffles deterministic.
    pub fn seed_shuffle(&self, seed: u64) {
        *self.inner.rng.lock() = StdRng::seed_from_u64(seed);
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.inner.store
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Option<Session> {
        self.inner.store.session()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.inner.store.repeat_mode()
    }

    /// Wait until every job queued so far has settled.
    pub async fn flush(&self) -> Result<()> {
        self.inner.commands.run(async {}).await?;
        Ok(())
    }

    /// Stop the command serializer. Queued jobs are dropped.
    pub fn shutdown(&self) {
        self.inner.commands.shutdown();
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Replace the session and start playing it.
    ///
    /// An empty queue clears the session and tears the engine down.
    pub async fn create_session(&self, request: SessionRequest) -> Result<()> {
        self.run("create_session", move |inner| inner.create_session(request))
            .await
    }

    pub async fn play(&self) -> Result<()> {
        self.run("play", Inner::play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.run("pause", Inner::pause).await
    }

    /// Tear down the engine and clear the session.
    pub async fn stop(&self) -> Result<()> {
        self.run("stop", Inner::clear).await
    }

    pub async fn destroy(&self) -> Result<()> {
        self.run("destroy", Inner::clear).await
    }

    pub async fn next(&self) -> Result<()> {
        self.run("next", Inner::next).await
    }

    /// Go to the previous track, or restart the first one when repeat is off.
    pub async fn previous(&self) -> Result<()> {
        self.run("previous", Inner::previous).await
    }

    /// Jump to a logical queue index.
    pub async fn skip(&self, index: usize) -> Result<()> {
        self.run("skip", move |inner| inner.skip(index)).await
    }

    /// Seek and hold progress at the target for [`PROGRESS_HOLD`].
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.run("seek", move |inner| inner.seek(position)).await
    }

    pub async fn toggle_repeat_mode(&self) -> Result<()> {
        self.run("toggle_repeat_mode", Inner::toggle_repeat_mode)
            .await
    }

    pub async fn toggle_shuffle(&self) -> Result<()> {
        self.run("toggle_shuffle", Inner::toggle_shuffle).await
    }

    /// Apply a progress report from the UI clock. Ignored while held.
    pub fn set_progress(&self, progress: Progress) -> bool {
        self.inner.store.set_progress(progress)
    }

    pub fn release_progress_hold(&self) {
        self.inner.store.release_progress_hold();
    }

    // ========================================================================
    // Dispatcher handlers
    // ========================================================================

    pub fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::TrackChanged {
                next_index,
                previous_index,
            } => {
                // The sync job that locked the queue caused this event
                if self.inner.store.is_queue_locked() {
                    debug!(?next_index, ?previous_index, "Queue locked, ignoring track change");
                    return;
                }
                let (Some(next_index), Some(_)) = (next_index, previous_index) else {
                    return;
                };
                self.enqueue("track_changed", move |inner| inner.track_changed(next_index));
            }
            EngineEvent::PlaybackState { state } => {
                self.enqueue("playback_state", move |inner| inner.playback_state(state));
            }
            EngineEvent::Progress { progress } => {
                self.inner.store.set_progress(progress);
            }
            EngineEvent::PlaybackError { code, message } => {
                self.handle_playback_error(&code, &message);
            }
            EngineEvent::QueueEnded { track } => {
                self.enqueue("queue_ended", move |_| async move {
                    debug!(?track, "Engine queue ended");
                    Ok(())
                });
            }
            EngineEvent::RemoteDuck { paused, permanent } => {
                self.enqueue("remote_duck", move |inner| inner.duck(paused, permanent));
            }
            EngineEvent::RemoteSeek { position } => {
                self.enqueue("remote_seek", move |inner| inner.seek(position));
            }
            EngineEvent::RemotePlay => self.enqueue("remote_play", Inner::play),
            EngineEvent::RemotePause => self.enqueue("remote_pause", Inner::pause),
            EngineEvent::RemoteNext => self.enqueue("remote_next", Inner::next),
            EngineEvent::RemotePrevious => self.enqueue("remote_previous", Inner::previous),
            EngineEvent::RemoteStop => self.enqueue("remote_stop", Inner::clear),
        }
    }

    /// A 416 from the stream source means the engine's byte range went stale;
    /// reload the window at the current position.
    fn handle_playback_error(&self, code: &str, message: &str) {
        if code == SOURCE_ERROR_CODE && message.contains("416") {
            warn!(code, message, "Stream range rejected, resetting queue");
            let state = self.inner.store.player_state();
            let position = self.inner.store.progress().map(|p| p.position);
            self.enqueue("reset_after_416", move |inner| inner.reset_queue(state, position));
            return;
        }

        warn!(code, message, "Engine playback error");
        self.inner.publish(PlaybackEvent::Error {
            message: format!("{code}: {message}"),
            recoverable: false,
        });
    }

    /// Record the class and reload the window with new stream URLs when it
    /// changed during a session.
    pub fn handle_connectivity_change(&self, class: ConnectivityClass) {
        let previous = self.inner.store.set_connectivity(class);
        if previous == class || !self.inner.store.has_session() {
            return;
        }

        info!(from = previous.as_str(), to = class.as_str(), "Connectivity class changed");
        let state = self.inner.store.player_state();
        let position = self.inner.store.progress().map(|p| p.position);
        self.enqueue("reset_after_network_change", move |inner| {
            inner.reset_queue(state, position)
        });
    }

    /// Resolve artwork for the whole queue, then rebuild the window so the
    /// neighbors pick it up. Dropped if the session is replaced meanwhile.
    pub fn handle_session_created(&self, context_id: &str) {
        let Some(fence) = ContextFence::capture(&self.inner.store) else {
            return;
        };
        if fence.context_id() != context_id {
            debug!(context_id, "Session already replaced, skipping artwork");
            return;
        }

        let controller = self.clone();
        tokio::spawn(async move {
            match controller.inner.mapper.fetch_queue_artwork(&fence).await {
                Ok(Fenced::Current(albums)) => {
                    if !fence.holds(&controller.inner.store) {
                        return;
                    }
                    debug!(albums, "Queue artwork resolved, rebuilding window");
                    controller.enqueue("artwork_rebuild", |inner| async move {
                        inner.sync_queue(true).await.map(|_| ())
                    });
                }
                Ok(Fenced::Superseded) => {}
                Err(e) => debug!(error = %e, "Queue artwork resolution failed"),
            }
        });
    }

    /// Scrobble the new current song when enabled. Best effort.
    pub fn handle_current_song_changed(&self, song_id: Option<String>) {
        let Some(song_id) = song_id else {
            return;
        };
        if !self.inner.mapper.settings().scrobble {
            return;
        }
        let Ok((_, client)) = self.inner.mapper.active_client() else {
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = client.scrobble(&song_id).await {
                debug!(song_id = %song_id, error = %e, "Scrobble failed");
            }
        });
    }

    // ========================================================================
    // Job plumbing
    // ========================================================================

    async fn run<F, Fut>(&self, label: &'static str, job: F) -> Result<()>
    where
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let job = Inner::guarded(&self.inner, label, job(Arc::clone(&self.inner)));
        self.inner.commands.run(job).await?
    }

    fn enqueue<F, Fut>(&self, label: &'static str, job: F)
    where
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let job = Inner::guarded(&self.inner, label, job(Arc::clone(&self.inner)));
        // Failures were already reported by the guard
        self.inner.commands.submit(job);
    }
}

impl Inner {
    /// Wrap a job so failures are reported and song changes observed.
    fn guarded<Fut>(
        this: &Arc<Self>,
        label: &'static str,
        job: Fut,
    ) -> impl Future<Output = Result<()>> + Send + 'static
    where
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let inner = Arc::clone(this);
        async move {
            let result = job.await;
            if let Err(e) = &result {
                inner.report_failure(label, e);
            }
            inner.observe_current_song();
            result
        }
    }

    fn report_failure(&self, label: &'static str, error: &PlaybackError) {
        if error.is_configuration_error() {
            debug!(job = label, error = %error, "Job skipped");
        } else {
            warn!(job = label, error = %error, "Job failed");
        }
        self.publish(PlaybackEvent::Error {
            message: error.to_string(),
            recoverable: error.is_configuration_error(),
        });
    }

    fn publish(&self, event: PlaybackEvent) {
        // No subscribers is fine
        self.events.emit(CoreEvent::Playback(event)).ok();
    }

    fn observe_current_song(&self) {
        let Some(song_id) = self.store.observe_current_song() else {
            return;
        };
        let index = self.store.with_session(|s| s.current_index);
        self.publish(PlaybackEvent::CurrentTrackChanged {
            song_id: song_id.clone(),
            index,
        });
        self.domain.send(DomainEvent::CurrentSongChanged { song_id });
    }

    async fn sync_queue(&self, rebuild: bool) -> Result<SyncOutcome> {
        let outcome = self.sync.sync(rebuild).await?;
        if outcome != SyncOutcome::NoSession {
            self.publish(PlaybackEvent::QueueSynced {
                outcome: outcome.to_string(),
            });
        }
        Ok(outcome)
    }

    async fn destroy_engine(&self) {
        if let Err(e) = self.engine.destroy().await {
            debug!(error = %e, "Engine destroy failed, continuing");
        }
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    #[instrument(skip(self, request), fields(context_id = %request.context_id))]
    async fn create_session(self: Arc<Self>, request: SessionRequest) -> Result<()> {
        let previously_shuffled = self.store.is_shuffled();
        let session = {
            let mut rng = self.rng.lock();
            Session::create(request, previously_shuffled, &mut *rng)?
        };

        let Some(session) = session else {
            debug!("Empty queue, clearing session");
            return self.clear().await;
        };

        let created = PlaybackEvent::SessionCreated {
            context_id: session.context_id.clone(),
            title: session.title.clone(),
            queue_type: session.queue_type.to_string(),
            queue_len: session.queue.len(),
            current_index: session.current_index,
            shuffled: session.is_shuffled(),
        };
        let context_id = session.context_id.clone();

        self.store.replace_session(Some(session));
        self.destroy_engine().await;
        self.engine.setup(self.mapper.player_options()).await?;
        self.sync_queue(false).await?;
        self.engine.play().await?;

        info!("Session created");
        self.publish(created);
        self.domain.send(DomainEvent::SessionCreated { context_id });
        Ok(())
    }

    async fn clear(self: Arc<Self>) -> Result<()> {
        self.destroy_engine().await;
        if self.store.replace_session(None).is_some() {
            self.publish(PlaybackEvent::SessionCleared);
        }
        Ok(())
    }

    async fn play(self: Arc<Self>) -> Result<()> {
        self.engine.play().await?;
        Ok(())
    }

    async fn pause(self: Arc<Self>) -> Result<()> {
        self.engine.pause().await?;
        Ok(())
    }

    async fn next(self: Arc<Self>) -> Result<()> {
        if let Err(e) = self.engine.skip_to_next().await {
            debug!(error = %e, "Skip to next ignored");
        }
        Ok(())
    }

    async fn previous(self: Arc<Self>) -> Result<()> {
        let Some(current) = self.store.with_session(|s| s.current_index) else {
            return Ok(());
        };
        if current == 0 && self.store.repeat_mode() == RepeatMode::Off {
            self.engine.seek_to(Duration::ZERO).await?;
        } else {
            self.engine.skip_to_previous().await?;
        }
        Ok(())
    }

    async fn skip(self: Arc<Self>, index: usize) -> Result<()> {
        let Some((current, len, state)) = self
            .store
            .with_session(|s| (s.current_index, s.queue.len(), s.player_state))
        else {
            return Ok(());
        };
        if index >= len {
            return Err(PlaybackError::InvalidQueueIndex { index, len });
        }
        if index == current {
            return Ok(());
        }

        // Adjacent targets are already loaded in the window
        if index == current + 1 {
            self.engine.skip_to_next().await?;
            return Ok(());
        }
        if current > 0 && index == current - 1 {
            self.engine.skip_to_previous().await?;
            return Ok(());
        }

        if let Some(result) = self.store.update_session(|s| s.set_current_index(index)) {
            result?;
        }
        self.reset_queue(state, None).await
    }

    async fn seek(self: Arc<Self>, position: Duration) -> Result<()> {
        self.seek_held(position).await
    }

    async fn seek_held(&self, position: Duration) -> Result<()> {
        let generation = self.store.hold_progress_at(position);
        self.engine.seek_to(position).await?;

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(PROGRESS_HOLD).await;
            store.release_progress_hold_if(generation);
        });
        Ok(())
    }

    async fn toggle_repeat_mode(self: Arc<Self>) -> Result<()> {
        let mode = self.store.repeat_mode().cycle();
        self.store.set_repeat_mode(mode);
        info!(mode = %mode, "Repeat mode changed");
        self.publish(PlaybackEvent::RepeatModeChanged {
            mode: mode.to_string(),
        });
        self.sync_queue(true).await?;
        Ok(())
    }

    async fn toggle_shuffle(self: Arc<Self>) -> Result<()> {
        let toggled = {
            let mut rng = self.rng.lock();
            self.store.update_session(|s| {
                s.toggle_shuffle(&mut *rng);
                (s.is_shuffled(), s.current_index)
            })
        };
        let Some((shuffled, current_index)) = toggled else {
            return Ok(());
        };

        info!(shuffled, current_index, "Shuffle toggled");
        self.publish(PlaybackEvent::ShuffleChanged {
            shuffled,
            current_index,
        });
        self.sync_queue(true).await?;
        Ok(())
    }

    /// Clear the engine, refill the window and restore playback.
    async fn reset_queue(self: Arc<Self>, state: PlayerState, position: Option<Duration>) -> Result<()> {
        if !self.store.has_session() {
            return Ok(());
        }
        self.engine.reset().await?;
        self.sync_queue(false).await?;
        if let Some(position) = position {
            self.seek_held(position).await?;
        }
        if state.is_active() {
            self.engine.play().await?;
        }
        Ok(())
    }

    /// Follow the engine pointer into the logical queue and re-center.
    async fn track_changed(self: Arc<Self>, next_index: usize) -> Result<()> {
        let Some((previous, len)) = self
            .store
            .with_session(|s| (s.current_index, s.queue.len()))
        else {
            return Ok(());
        };

        let window = self.engine.get_queue().await?;
        let slot = self
            .engine
            .get_current_index()
            .await?
            .unwrap_or(next_index);
        let Some(track) = window.get(slot) else {
            debug!(slot, window_len = window.len(), "Pointer outside engine window");
            return Ok(());
        };
        let current = track.idx;

        if let Some(result) = self.store.update_session(|s| s.set_current_index(current)) {
            result?;
        }
        debug!(previous, current, slot, "Engine moved to new track");

        // Wrapped past the end with repeat off
        if self.store.repeat_mode() == RepeatMode::Off
            && current == 0
            && previous + 1 == len
            && slot == 2
        {
            debug!("Reached end of queue, pausing");
            self.engine.pause().await?;
        }

        self.sync_queue(false).await?;
        Ok(())
    }

    async fn playback_state(self: Arc<Self>, state: PlayerState) -> Result<()> {
        if !self.store.has_session() {
            return Ok(());
        }
        if self.store.player_state() != state {
            self.store.set_player_state(state);
            self.publish(PlaybackEvent::StateChanged {
                state: state.as_str().to_string(),
            });
        }
        Ok(())
    }

    async fn duck(self: Arc<Self>, paused: bool, permanent: bool) -> Result<()> {
        if permanent {
            debug!("Permanent audio focus loss, stopping");
            self.engine.stop().await?;
            return Ok(());
        }

        let Some((state, duck_paused)) = self
            .store
            .with_session(|s| (s.player_state, s.duck_paused))
        else {
            return Ok(());
        };

        if paused {
            if state.is_active() {
                self.engine.pause().await?;
                self.store.set_duck_paused(true);
            }
        } else if duck_paused {
            self.engine.play().await?;
            self.store.set_duck_paused(false);
        }
        Ok(())
    }
}
