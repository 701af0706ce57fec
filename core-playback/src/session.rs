//! # Session Model
//!
//! The logical play queue and everything the controller tracks about it.
//!
//! ## Overview
//!
//! A [`Session`] owns the full, ordered song list. When shuffled, `queue` is
//! stored already permuted and `shuffle_order[i]` is the original position of
//! the song now at position `i`, which makes unshuffling an exact inverse
//! lookup.
//!
//! A session never exists with an empty queue: creating one from an empty
//! list clears the player instead. While a session exists,
//! `current_index < queue.len()` holds.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{PlayerState, Progress};
use core_library::models::{QueueType, Song};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repeat behavior, which also decides the window's neighbor slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Queue,
    Track,
}

impl RepeatMode {
    /// Off → Queue → Track → Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Queue,
            RepeatMode::Queue => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Queue => "queue",
            RepeatMode::Track => "track",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical indices of the previous and next songs around `current`.
///
/// Track repeat pins both neighbors to the current song; otherwise indices
/// wrap around the ends of the queue.
pub fn neighbor_indices(current: usize, len: usize, repeat: RepeatMode) -> (usize, usize) {
    if repeat == RepeatMode::Track || len == 0 {
        return (current, current);
    }
    let prev = if current == 0 { len - 1 } else { current - 1 };
    let next = (current + 1) % len;
    (prev, next)
}

/// Random permutation of `0..len`.
///
/// Indices are drawn uniformly from the remaining pool one at a time. A
/// pinned index is then moved to the front without disturbing the relative
/// order of the rest.
pub fn shuffle_order<R: Rng + ?Sized>(len: usize, pinned: Option<usize>, rng: &mut R) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..len).collect();
    let mut order = Vec::with_capacity(len);
    while !pool.is_empty() {
        let pick = rng.gen_range(0..pool.len());
        order.push(pool.swap_remove(pick));
    }

    if let Some(first) = pinned {
        if let Some(at) = order.iter().position(|&i| i == first) {
            order.remove(at);
            order.insert(0, first);
        }
    }
    order
}

/// Shuffle `queue`, returning the permuted songs and the order that undoes it.
pub fn shuffle_queue<T: Clone, R: Rng + ?Sized>(
    queue: &[T],
    pinned: Option<usize>,
    rng: &mut R,
) -> (Vec<T>, Vec<usize>) {
    let order = shuffle_order(queue.len(), pinned, rng);
    let shuffled = order.iter().map(|&i| queue[i].clone()).collect();
    (shuffled, order)
}

/// Restore the original order of a queue shuffled with `order`.
pub fn unshuffle_queue<T: Clone>(queue: &[T], order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = vec![None; queue.len()];
    for (position, &original) in order.iter().enumerate() {
        if let (Some(slot), Some(item)) = (slots.get_mut(original), queue.get(position)) {
            *slot = Some(item.clone());
        }
    }
    slots.into_iter().flatten().collect()
}

/// The active playback context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub queue: Vec<Song>,
    pub title: String,
    pub queue_type: QueueType,
    /// Identifies where the queue came from; compared before committing
    /// results of long-running work.
    pub context_id: String,
    pub current_index: usize,
    pub shuffle_order: Option<Vec<usize>>,
    pub progress: Progress,
    /// Suppresses progress updates while a seek is in flight.
    pub hold_progress: bool,
    pub player_state: PlayerState,
    /// Playback was paused by a transient audio-focus loss.
    pub duck_paused: bool,
}

/// Parameters for [`Session::create`].
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub queue: Vec<Song>,
    pub title: String,
    pub queue_type: QueueType,
    pub context_id: String,
    pub play_index: Option<usize>,
    /// `None` keeps the shuffle state of the session being replaced.
    pub shuffle: Option<bool>,
}

impl SessionRequest {
    pub fn new(
        queue: Vec<Song>,
        title: impl Into<String>,
        queue_type: QueueType,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            title: title.into(),
            queue_type,
            context_id: context_id.into(),
            play_index: None,
            shuffle: None,
        }
    }

    pub fn play_index(mut self, index: usize) -> Self {
        self.play_index = Some(index);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }
}

impl Session {
    /// Build a session from a request.
    ///
    /// Returns `Ok(None)` for an empty queue.
    pub fn create<R: Rng + ?Sized>(
        request: SessionRequest,
        previously_shuffled: bool,
        rng: &mut R,
    ) -> Result<Option<Self>> {
        let SessionRequest {
            queue,
            title,
            queue_type,
            context_id,
            play_index,
            shuffle,
        } = request;

        if queue.is_empty() {
            return Ok(None);
        }
        if let Some(index) = play_index {
            if index >= queue.len() {
                return Err(PlaybackError::InvalidQueueIndex {
                    index,
                    len: queue.len(),
                });
            }
        }

        let mut session = Session {
            queue,
            title,
            queue_type,
            context_id,
            current_index: play_index.unwrap_or(0),
            shuffle_order: None,
            progress: Progress::default(),
            hold_progress: false,
            player_state: PlayerState::None,
            duck_paused: false,
        };

        if shuffle.unwrap_or(previously_shuffled) {
            let (shuffled, order) = shuffle_queue(&session.queue, play_index, rng);
            session.queue = shuffled;
            session.shuffle_order = Some(order);
            session.current_index = 0;
        }

        Ok(Some(session))
    }

    pub fn current(&self) -> &Song {
        &self.queue[self.current_index]
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle_order.is_some()
    }

    pub fn neighbors(&self, repeat: RepeatMode) -> (usize, usize) {
        neighbor_indices(self.current_index, self.queue.len(), repeat)
    }

    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        if index >= self.queue.len() {
            return Err(PlaybackError::InvalidQueueIndex {
                index,
                len: self.queue.len(),
            });
        }
        self.current_index = index;
        Ok(())
    }

    /// Shuffle with the current song first, or restore the original order.
    pub fn toggle_shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.shuffle_order.take() {
            None => {
                let (shuffled, order) = shuffle_queue(&self.queue, Some(self.current_index), rng);
                self.queue = shuffled;
                self.shuffle_order = Some(order);
                self.current_index = 0;
            }
            Some(order) => {
                self.queue = unshuffle_queue(&self.queue, &order);
                self.current_index = order
                    .get(self.current_index)
                    .copied()
                    .unwrap_or(self.current_index);
            }
        }
    }
}
