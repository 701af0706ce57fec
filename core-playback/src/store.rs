//! # Player Store
//!
//! Explicit state container shared by the controller components.
//!
//! ## Overview
//!
//! Holds the optional [`Session`], the repeat mode, the queue lock flag, the
//! connectivity class used for stream bitrates, and the id of the song last
//! reported as current. It is handed to every component at construction and
//! mutated only through the methods below.
//!
//! Locks are never held across an `.await`; callers read a value, release the
//! store, do async work, and write back.

use crate::session::{RepeatMode, Session};
use bridge_traits::network::ConnectivityClass;
use bridge_traits::playback::{PlayerState, Progress};
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct StoreState {
    session: Option<Session>,
    repeat_mode: RepeatMode,
    queue_locked: bool,
    connectivity: ConnectivityClass,
    current_song_id: Option<String>,
    hold_generation: u64,
}

/// Shared playback state.
#[derive(Debug)]
pub struct PlayerStore {
    state: RwLock<StoreState>,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore {
    /// Starts without a session and assumes a metered link until the network
    /// monitor reports otherwise.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                connectivity: ConnectivityClass::Metered,
                ..Default::default()
            }),
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Snapshot of the current session.
    pub fn session(&self) -> Option<Session> {
        self.state.read().session.clone()
    }

    pub fn has_session(&self) -> bool {
        self.state.read().session.is_some()
    }

    /// Read from the session without cloning it.
    pub fn with_session<T>(&self, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.state.read().session.as_ref().map(f)
    }

    /// Mutate the session if one exists.
    pub fn update_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        self.state.write().session.as_mut().map(f)
    }

    /// Replace the session wholesale, returning the previous one.
    pub fn replace_session(&self, session: Option<Session>) -> Option<Session> {
        std::mem::replace(&mut self.state.write().session, session)
    }

    pub fn context_id(&self) -> Option<String> {
        self.with_session(|s| s.context_id.clone())
    }

    pub fn is_shuffled(&self) -> bool {
        self.with_session(Session::is_shuffled).unwrap_or(false)
    }

    // ========================================================================
    // Transient playback state
    // ========================================================================

    pub fn player_state(&self) -> PlayerState {
        self.with_session(|s| s.player_state).unwrap_or_default()
    }

    pub fn set_player_state(&self, state: PlayerState) {
        self.update_session(|s| s.player_state = state);
    }

    pub fn progress(&self) -> Option<Progress> {
        self.with_session(|s| s.progress)
    }

    /// Store a progress report unless a seek is holding progress.
    ///
    /// Returns `true` when the report was applied.
    pub fn set_progress(&self, progress: Progress) -> bool {
        self.update_session(|s| {
            if s.hold_progress {
                return false;
            }
            s.progress = progress;
            true
        })
        .unwrap_or(false)
    }

    /// Hold progress at an optimistic position. Returns a generation token
    /// for [`PlayerStore::release_progress_hold_if`].
    pub fn hold_progress_at(&self, position: std::time::Duration) -> u64 {
        let mut state = self.state.write();
        state.hold_generation += 1;
        let generation = state.hold_generation;
        if let Some(session) = state.session.as_mut() {
            session.hold_progress = true;
            session.progress.position = position;
        }
        generation
    }

    pub fn release_progress_hold(&self) {
        self.update_session(|s| s.hold_progress = false);
    }

    /// Release the hold only if no newer seek replaced it.
    pub fn release_progress_hold_if(&self, generation: u64) {
        let mut state = self.state.write();
        if state.hold_generation != generation {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.hold_progress = false;
        }
    }

    pub fn duck_paused(&self) -> bool {
        self.with_session(|s| s.duck_paused).unwrap_or(false)
    }

    pub fn set_duck_paused(&self, paused: bool) {
        self.update_session(|s| s.duck_paused = paused);
    }

    // ========================================================================
    // Player-wide settings
    // ========================================================================

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.read().repeat_mode
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        self.state.write().repeat_mode = mode;
    }

    pub fn connectivity(&self) -> ConnectivityClass {
        self.state.read().connectivity
    }

    /// Record the connectivity class, returning the previous one.
    pub fn set_connectivity(&self, class: ConnectivityClass) -> ConnectivityClass {
        std::mem::replace(&mut self.state.write().connectivity, class)
    }

    // ========================================================================
    // Queue lock
    // ========================================================================

    pub fn is_queue_locked(&self) -> bool {
        self.state.read().queue_locked
    }

    /// Lock the queue until the returned guard drops.
    pub fn lock_queue(&self) -> QueueLockGuard<'_> {
        self.state.write().queue_locked = true;
        QueueLockGuard { store: self }
    }

    // ========================================================================
    // Current song tracking
    // ========================================================================

    /// Record the song now under the pointer.
    ///
    /// Returns the new id when it differs from the last recorded one.
    pub fn observe_current_song(&self) -> Option<Option<String>> {
        let mut state = self.state.write();
        let current = state.session.as_ref().map(|s| s.current().id.clone());
        if current == state.current_song_id {
            return None;
        }
        state.current_song_id = current.clone();
        Some(current)
    }
}

/// Clears the queue lock on drop, including on early error returns.
#[must_use = "the queue unlocks as soon as the guard is dropped"]
pub struct QueueLockGuard<'a> {
    store: &'a PlayerStore,
}

impl Drop for QueueLockGuard<'_> {
    fn drop(&mut self) {
        self.store.state.write().queue_locked = false;
    }
}
