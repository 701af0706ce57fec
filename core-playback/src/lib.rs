//! # Playback Session Controller
//!
//! Keeps a host audio engine playing a logical queue of arbitrary length.
//!
//! ## Overview
//!
//! This module handles:
//! - Session creation with optional pinned-first shuffle
//! - Syncing the queue into the engine's three-slot window
//! - Track mapping with bitrate ceilings and local offline files
//! - Serialized engine calls and the domain event dispatcher
//! - Fenced background artwork resolution

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod fence;
pub mod queue_sync;
pub mod session;
pub mod store;
pub mod track_mapper;

pub use controller::{PlayerController, PROGRESS_HOLD};
pub use dispatcher::{DomainEvent, DomainEventSender, EventDispatcher};
pub use error::{PlaybackError, Result};
pub use fence::{ContextFence, Fenced};
pub use queue_sync::{QueueSync, SyncOutcome};
pub use session::{RepeatMode, Session, SessionRequest};
pub use store::PlayerStore;
pub use track_mapper::TrackMapper;
