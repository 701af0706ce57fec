//! Integration tests for the playback controller
//!
//! These tests verify the intent and engine-callback paths end to end:
//! - Session creation, replacement and teardown
//! - Track changes following the engine pointer, including end-of-queue pause
//! - Shuffle and repeat toggles rebuilding the window
//! - Skips, seeks with progress hold, audio focus ducking
//! - Source-range errors and connectivity changes resetting the window
//! - Fenced artwork resolution and scrobbling through the dispatcher

mod common;

use bridge_traits::network::ConnectivityClass;
use bridge_traits::playback::{EngineEvent, PlayerState, Progress};
use bridge_traits::storage::FileKind;
use common::{harness, harness_with, ids, request, songs, SERVER_ID};
use core_library::models::{Album, QueueType, Song};
use core_playback::dispatcher::EventDispatcher;
use core_playback::fence::{ContextFence, Fenced};
use core_playback::session::{RepeatMode, SessionRequest};
use core_playback::{PlaybackError, PROGRESS_HOLD};
use core_runtime::config::PlaybackSettings;
use core_runtime::events::{CoreEvent, PlaybackEvent, Receiver};
use std::time::Duration;

fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Playback(event) = event {
            events.push(event);
        }
    }
    events
}

/// Poll until `check` passes or a second elapses.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

fn track_changed(next: usize, previous: usize) -> EngineEvent {
    EngineEvent::TrackChanged {
        next_index: Some(next),
        previous_index: Some(previous),
    }
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_session_loads_window_and_plays() {
    let mut h = harness().await;
    let mut rx = h.bus.subscribe();

    h.controller.create_session(request(5, 2)).await.unwrap();

    assert_eq!(
        h.engine.calls(),
        vec!["destroy", "setup", "add", "add", "play"]
    );
    assert_eq!(h.engine.window_ids(), ids(&["s1", "s2", "s3"]));
    assert_eq!(h.engine.pointer(), Some(1));

    let session = h.controller.session().unwrap();
    assert_eq!(session.current_index, 2);
    assert_eq!(session.context_id, "al-1");

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::SessionCreated { queue_len: 5, current_index: 2, shuffled: false, .. }
    )));
    assert!(events.contains(&PlaybackEvent::CurrentTrackChanged {
        song_id: Some("s2".to_string()),
        index: Some(2),
    }));

    let notified = h.inbox.try_recv().unwrap();
    assert_eq!(notified.name(), "session-created");
}

#[tokio::test]
async fn test_empty_queue_clears_session() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();
    let mut rx = h.bus.subscribe();

    let empty = SessionRequest::new(Vec::new(), "Nothing", QueueType::Song, "none");
    h.controller.create_session(empty).await.unwrap();

    assert!(h.controller.session().is_none());
    assert_eq!(h.engine.destroys(), 2);
    assert!(h.engine.window_ids().is_empty());
    assert!(drain(&mut rx).contains(&PlaybackEvent::SessionCleared));
}

#[tokio::test]
async fn test_invalid_play_index_is_rejected_and_reported() {
    let h = harness().await;
    let mut rx = h.bus.subscribe();

    let err = h.controller.create_session(request(3, 7)).await.unwrap_err();

    assert!(matches!(err, PlaybackError::InvalidQueueIndex { index: 7, len: 3 }));
    assert!(h.controller.session().is_none());
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Error { recoverable: false, .. })));
}

#[tokio::test]
async fn test_shuffled_session_pins_selected_song_first() {
    let h = harness().await;
    let shuffled = SessionRequest::new(songs(6), "Mix", QueueType::Playlist, "pl-1")
        .play_index(3)
        .shuffle(true);

    h.controller.create_session(shuffled).await.unwrap();

    let session = h.controller.session().unwrap();
    assert!(session.is_shuffled());
    assert_eq!(session.current_index, 0);
    assert_eq!(session.queue[0].id, "s3");
    assert_eq!(h.engine.window_ids()[1], "s3");

    // Unspecified shuffle keeps the previous session's setting
    let next = SessionRequest::new(songs(4), "Other", QueueType::Album, "al-2");
    h.controller.create_session(next).await.unwrap();
    assert!(h.controller.session().unwrap().is_shuffled());
}

#[tokio::test]
async fn test_stop_tears_down_engine_and_session() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();
    let mut rx = h.bus.subscribe();

    h.controller.stop().await.unwrap();

    assert!(h.controller.session().is_none());
    assert!(h.engine.window_ids().is_empty());
    assert!(drain(&mut rx).contains(&PlaybackEvent::SessionCleared));
}

// ============================================================================
// Track changes
// ============================================================================

#[tokio::test]
async fn test_next_follows_engine_pointer() {
    let h = harness().await;
    h.controller.create_session(request(5, 0)).await.unwrap();

    h.controller.next().await.unwrap();
    h.controller.handle_engine_event(track_changed(2, 1));
    h.controller.flush().await.unwrap();

    assert_eq!(h.controller.session().unwrap().current_index, 1);
    assert_eq!(h.engine.window_indices(), vec![0, 1, 2]);
    assert_eq!(h.engine.pointer(), Some(1));
}

#[tokio::test]
async fn test_wrapping_past_end_pauses_when_repeat_off() {
    let h = harness().await;
    h.controller.create_session(request(3, 2)).await.unwrap();
    h.engine.clear_calls();

    h.controller.next().await.unwrap();
    h.controller.handle_engine_event(track_changed(2, 1));
    h.controller.flush().await.unwrap();

    assert_eq!(h.controller.session().unwrap().current_index, 0);
    assert!(h.engine.calls().contains(&"pause"));
    assert_eq!(h.engine.player_state(), PlayerState::Paused);
    assert_eq!(h.engine.window_indices(), vec![2, 0, 1]);
}

#[tokio::test]
async fn test_wrapping_past_end_keeps_playing_with_repeat_queue() {
    let h = harness().await;
    h.controller.create_session(request(3, 2)).await.unwrap();
    h.controller.toggle_repeat_mode().await.unwrap();
    assert_eq!(h.controller.repeat_mode(), RepeatMode::Queue);
    h.engine.clear_calls();

    h.controller.next().await.unwrap();
    h.controller.handle_engine_event(track_changed(2, 1));
    h.controller.flush().await.unwrap();

    assert_eq!(h.controller.session().unwrap().current_index, 0);
    assert!(!h.engine.calls().contains(&"pause"));
}

#[tokio::test]
async fn test_track_change_ignored_while_queue_locked() {
    let h = harness().await;
    h.controller.create_session(request(5, 0)).await.unwrap();
    h.engine.advance();

    {
        let _lock = h.store.lock_queue();
        h.controller.handle_engine_event(track_changed(2, 1));
    }
    h.controller.flush().await.unwrap();

    assert_eq!(h.controller.session().unwrap().current_index, 0);
}

#[tokio::test]
async fn test_track_change_without_both_indices_is_ignored() {
    let h = harness().await;
    h.controller.create_session(request(5, 0)).await.unwrap();
    h.engine.advance();

    h.controller.handle_engine_event(EngineEvent::TrackChanged {
        next_index: Some(2),
        previous_index: None,
    });
    h.controller.flush().await.unwrap();

    assert_eq!(h.controller.session().unwrap().current_index, 0);
}

// ============================================================================
// Transport intents
// ============================================================================

#[tokio::test]
async fn test_previous_at_start_restarts_track_when_repeat_off() {
    let h = harness().await;
    h.controller.create_session(request(4, 0)).await.unwrap();
    h.engine.clear_calls();

    h.controller.previous().await.unwrap();

    assert_eq!(h.engine.calls(), vec!["seek_to"]);
    assert_eq!(h.engine.seeks(), vec![Duration::ZERO]);
}

#[tokio::test]
async fn test_previous_at_start_wraps_with_repeat_queue() {
    let h = harness().await;
    h.controller.create_session(request(4, 0)).await.unwrap();
    h.controller.toggle_repeat_mode().await.unwrap();
    h.engine.clear_calls();

    h.controller.previous().await.unwrap();

    assert_eq!(h.engine.calls(), vec!["skip_to_previous"]);
}

#[tokio::test]
async fn test_skip_to_same_index_does_nothing() {
    let h = harness().await;
    h.controller.create_session(request(5, 2)).await.unwrap();
    h.engine.clear_calls();

    h.controller.skip(2).await.unwrap();

    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn test_skip_to_neighbor_uses_engine_skip() {
    let h = harness().await;
    h.controller.create_session(request(5, 2)).await.unwrap();
    h.engine.clear_calls();

    h.controller.skip(3).await.unwrap();
    h.controller.skip(1).await.unwrap();

    assert_eq!(h.engine.calls(), vec!["skip_to_next", "skip_to_previous"]);
}

#[tokio::test]
async fn test_skip_far_resets_window_and_resumes() {
    let h = harness().await;
    h.controller.create_session(request(6, 0)).await.unwrap();
    h.controller.handle_engine_event(EngineEvent::PlaybackState {
        state: PlayerState::Playing,
    });
    h.controller.flush().await.unwrap();
    h.engine.clear_calls();

    h.controller.skip(4).await.unwrap();

    assert_eq!(h.controller.session().unwrap().current_index, 4);
    assert_eq!(h.engine.window_indices(), vec![3, 4, 5]);
    assert_eq!(h.engine.calls(), vec!["reset", "add", "add", "play"]);
}

#[tokio::test]
async fn test_skip_out_of_range_fails() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();

    let err = h.controller.skip(9).await.unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidQueueIndex { index: 9, len: 3 }));
}

#[tokio::test]
async fn test_seek_holds_progress_until_released() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();

    h.controller.seek(Duration::from_secs(30)).await.unwrap();

    assert_eq!(h.engine.seeks(), vec![Duration::from_secs(30)]);
    assert!(!h.controller.set_progress(Progress::at(Duration::from_secs(2))));
    assert_eq!(
        h.store.progress().unwrap().position,
        Duration::from_secs(30)
    );

    tokio::time::sleep(PROGRESS_HOLD + Duration::from_millis(100)).await;
    assert!(h.controller.set_progress(Progress::at(Duration::from_secs(31))));
}

// ============================================================================
// Toggles
// ============================================================================

#[tokio::test]
async fn test_toggle_shuffle_round_trip_keeps_current_song() {
    let h = harness().await;
    let mut rx = h.bus.subscribe();
    h.controller.create_session(request(4, 2)).await.unwrap();

    h.controller.toggle_shuffle().await.unwrap();
    let shuffled = h.controller.session().unwrap();
    assert_eq!(shuffled.queue[0].id, "s2");
    assert_eq!(shuffled.current_index, 0);
    assert_eq!(h.engine.window_ids()[1], "s2");
    assert_eq!(h.engine.pointer(), Some(1));

    h.controller.toggle_shuffle().await.unwrap();
    let restored = h.controller.session().unwrap();
    let order: Vec<&str> = restored.queue.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(order, vec!["s0", "s1", "s2", "s3"]);
    assert_eq!(restored.current_index, 2);
    assert_eq!(h.engine.window_ids(), ids(&["s1", "s2", "s3"]));

    let toggles: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, PlaybackEvent::ShuffleChanged { .. }))
        .collect();
    assert_eq!(
        toggles,
        vec![
            PlaybackEvent::ShuffleChanged { shuffled: true, current_index: 0 },
            PlaybackEvent::ShuffleChanged { shuffled: false, current_index: 2 },
        ]
    );
}

#[tokio::test]
async fn test_repeat_mode_cycles_and_rebuilds_neighbors() {
    let h = harness().await;
    h.controller.create_session(request(4, 1)).await.unwrap();

    h.controller.toggle_repeat_mode().await.unwrap();
    assert_eq!(h.controller.repeat_mode(), RepeatMode::Queue);
    assert_eq!(h.engine.window_indices(), vec![0, 1, 2]);

    h.controller.toggle_repeat_mode().await.unwrap();
    assert_eq!(h.controller.repeat_mode(), RepeatMode::Track);
    assert_eq!(h.engine.window_indices(), vec![1, 1, 1]);

    h.controller.toggle_repeat_mode().await.unwrap();
    assert_eq!(h.controller.repeat_mode(), RepeatMode::Off);
    assert_eq!(h.engine.window_indices(), vec![0, 1, 2]);
    assert_eq!(h.engine.pointer(), Some(1));
}

// ============================================================================
// Engine callbacks
// ============================================================================

#[tokio::test]
async fn test_transient_duck_pauses_and_resumes() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();
    h.controller.handle_engine_event(EngineEvent::PlaybackState {
        state: PlayerState::Playing,
    });
    h.controller.handle_engine_event(EngineEvent::RemoteDuck {
        paused: true,
        permanent: false,
    });
    h.controller.flush().await.unwrap();

    assert_eq!(h.engine.player_state(), PlayerState::Paused);
    assert!(h.store.duck_paused());

    h.controller.handle_engine_event(EngineEvent::RemoteDuck {
        paused: false,
        permanent: false,
    });
    h.controller.flush().await.unwrap();

    assert_eq!(h.engine.player_state(), PlayerState::Playing);
    assert!(!h.store.duck_paused());
}

#[tokio::test]
async fn test_unduck_without_duck_pause_does_not_resume() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();
    h.controller.pause().await.unwrap();
    h.engine.clear_calls();

    h.controller.handle_engine_event(EngineEvent::RemoteDuck {
        paused: false,
        permanent: false,
    });
    h.controller.flush().await.unwrap();

    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn test_permanent_duck_stops() {
    let h = harness().await;
    h.controller.create_session(request(3, 0)).await.unwrap();

    h.controller.handle_engine_event(EngineEvent::RemoteDuck {
        paused: true,
        permanent: true,
    });
    h.controller.flush().await.unwrap();

    assert_eq!(h.engine.player_state(), PlayerState::Stopped);
}

#[tokio::test]
async fn test_range_error_resets_at_current_position() {
    let h = harness().await;
    h.controller.create_session(request(4, 1)).await.unwrap();
    h.controller.set_progress(Progress::at(Duration::from_secs(42)));

    h.controller.handle_engine_event(EngineEvent::PlaybackError {
        code: "playback-source".to_string(),
        message: "Response code: 416".to_string(),
    });
    h.controller.flush().await.unwrap();

    assert_eq!(h.engine.resets(), 1);
    assert_eq!(h.engine.seeks(), vec![Duration::from_secs(42)]);
    assert_eq!(h.engine.window_indices(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_other_playback_errors_do_not_reset() {
    let h = harness().await;
    h.controller.create_session(request(4, 1)).await.unwrap();

    h.controller.handle_engine_event(EngineEvent::PlaybackError {
        code: "playback-source".to_string(),
        message: "Response code: 500".to_string(),
    });
    h.controller.flush().await.unwrap();

    assert_eq!(h.engine.resets(), 0);
}

#[tokio::test]
async fn test_connectivity_change_reloads_stream_urls() {
    let h = harness().await;
    h.controller.create_session(request(3, 1)).await.unwrap();
    assert!(h.engine.tracks()[1].url.contains("maxBitRate=192"));

    h.controller.handle_connectivity_change(ConnectivityClass::Metered);
    h.controller.flush().await.unwrap();
    assert_eq!(h.engine.resets(), 0);

    h.controller.handle_connectivity_change(ConnectivityClass::Unmetered);
    h.controller.flush().await.unwrap();
    assert_eq!(h.engine.resets(), 1);
    assert!(h.engine.tracks()[1].url.contains("maxBitRate=0"));
}

// ============================================================================
// Dispatcher-driven side effects
// ============================================================================

#[tokio::test]
async fn test_session_artwork_resolves_and_rebuilds_window() {
    let h = harness().await;
    let mut album = Album::new("al-a", "Album A");
    album.cover_art = Some("cov1".to_string());
    let queue: Vec<Song> = (0..3)
        .map(|i| Song::new(format!("s{i}"), format!("Song {i}")).with_album("al-a", "Album A"))
        .collect();
    h.catalog.add_album(album, queue.clone());

    let dispatcher = EventDispatcher::new(h.inbox, h.controller.clone());
    let shutdown = dispatcher.shutdown_token();
    let task = dispatcher.spawn();

    let request = SessionRequest::new(queue, "Album A", QueueType::Album, "al-a");
    h.controller.create_session(request).await.unwrap();

    let expected = format!("/files/{SERVER_ID}/coverArtThumb/cov1");
    let engine = h.engine.clone();
    assert!(
        eventually(|| engine
            .tracks()
            .iter()
            .all(|t| t.artwork.as_deref() == Some(expected.as_str())))
        .await
    );
    assert_eq!(
        h.fetcher.fetched(),
        vec![(FileKind::CoverArtThumb, "cov1".to_string())]
    );

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_artwork_for_replaced_session_is_superseded() {
    let h = harness().await;
    let mut album = Album::new("al-a", "Album A");
    album.cover_art = Some("cov1".to_string());
    let queue = vec![Song::new("s0", "Song 0").with_album("al-a", "Album A")];
    h.catalog.add_album(album, queue.clone());

    let first = SessionRequest::new(queue, "Album A", QueueType::Album, "al-a");
    h.controller.create_session(first).await.unwrap();
    let fence = ContextFence::capture(&h.store).unwrap();

    h.controller.create_session(request(3, 0)).await.unwrap();

    let result = h.mapper.fetch_queue_artwork(&fence).await.unwrap();
    assert_eq!(result, Fenced::Superseded);
    assert!(h.fetcher.fetched().is_empty());
}

#[tokio::test]
async fn test_current_song_changes_are_scrobbled() {
    let h = harness_with(PlaybackSettings {
        scrobble: true,
        ..PlaybackSettings::default()
    })
    .await;
    let dispatcher = EventDispatcher::new(h.inbox, h.controller.clone());
    let task = dispatcher.spawn();

    h.controller.create_session(request(3, 0)).await.unwrap();
    h.controller.next().await.unwrap();
    h.controller.handle_engine_event(track_changed(2, 1));
    h.controller.flush().await.unwrap();

    let catalog = h.catalog.clone();
    assert!(eventually(|| catalog.scrobbles() == ids(&["s0", "s1"])).await);

    h.controller.shutdown();
    task.abort();
}

#[tokio::test]
async fn test_scrobbling_disabled_by_default() {
    let h = harness().await;
    let task = EventDispatcher::new(h.inbox, h.controller.clone()).spawn();

    h.controller.create_session(request(3, 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.catalog.scrobbles().is_empty());
    task.abort();
}
