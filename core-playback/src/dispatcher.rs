//! # Domain Event Dispatcher
//!
//! Single-consumer loop that routes inbound notifications to the
//! [`PlayerController`].
//!
//! ## Overview
//!
//! Engine callbacks, connectivity changes and the controller's own
//! notifications (session created, current song changed) are sent as
//! [`DomainEvent`]s over one unbounded channel. The dispatcher reads them in
//! order and hands each to a controller handler. Handlers only inspect the
//! store and enqueue serializer jobs, so the loop never waits on the engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (events, inbox) = dispatcher::channel();
//! let controller = PlayerController::new(engine, store, mapper, bus, events.clone());
//! let task = EventDispatcher::new(inbox, controller.clone()).spawn();
//!
//! events.engine(EngineEvent::RemotePlay);
//! ```

use crate::controller::PlayerController;
use bridge_traits::network::ConnectivityClass;
use bridge_traits::playback::EngineEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Everything the dispatcher reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Forwarded from the host's audio engine.
    Engine(EngineEvent),
    /// The network monitor reported a (possibly unchanged) class.
    ConnectivityChanged(ConnectivityClass),
    /// A new session was installed and started.
    SessionCreated { context_id: String },
    /// The song under the pointer changed.
    CurrentSongChanged { song_id: Option<String> },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Engine(event) => event.name(),
            DomainEvent::ConnectivityChanged(_) => "connectivity-changed",
            DomainEvent::SessionCreated { .. } => "session-created",
            DomainEvent::CurrentSongChanged { .. } => "current-song-changed",
        }
    }
}

/// Cloneable sending side of the dispatcher channel.
#[derive(Debug, Clone)]
pub struct DomainEventSender {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl DomainEventSender {
    /// Queue an event. Returns `false` once the dispatcher is gone.
    pub fn send(&self, event: DomainEvent) -> bool {
        let name = event.name();
        let sent = self.tx.send(event).is_ok();
        if !sent {
            debug!(event = name, "Dispatcher stopped, dropping event");
        }
        sent
    }

    pub fn engine(&self, event: EngineEvent) -> bool {
        self.send(DomainEvent::Engine(event))
    }

    pub fn connectivity(&self, class: ConnectivityClass) -> bool {
        self.send(DomainEvent::ConnectivityChanged(class))
    }
}

pub type DomainEventReceiver = mpsc::UnboundedReceiver<DomainEvent>;

/// Create the dispatcher channel.
pub fn channel() -> (DomainEventSender, DomainEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DomainEventSender { tx }, rx)
}

pub struct EventDispatcher {
    inbox: DomainEventReceiver,
    controller: PlayerController,
    shutdown: CancellationToken,
}

impl EventDispatcher {
    pub fn new(inbox: DomainEventReceiver, controller: PlayerController) -> Self {
        Self {
            inbox,
            controller,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until the channel closes or shutdown is requested.
    pub async fn run(mut self) {
        debug!("Playback dispatcher started");
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.inbox.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.dispatch(event);
        }
        debug!("Playback dispatcher stopped");
    }

    fn dispatch(&self, event: DomainEvent) {
        trace!(event = event.name(), "Dispatching");
        match event {
            DomainEvent::Engine(event) => self.controller.handle_engine_event(event),
            DomainEvent::ConnectivityChanged(class) => {
                self.controller.handle_connectivity_change(class)
            }
            DomainEvent::SessionCreated { context_id } => {
                self.controller.handle_session_created(&context_id)
            }
            DomainEvent::CurrentSongChanged { song_id } => {
                self.controller.handle_current_song_changed(song_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_reports_closed_channel() {
        let (events, inbox) = channel();
        assert!(events.engine(EngineEvent::RemotePlay));
        drop(inbox);
        assert!(!events.connectivity(ConnectivityClass::Metered));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            DomainEvent::Engine(EngineEvent::RemoteStop).name(),
            "remote-stop"
        );
        assert_eq!(
            DomainEvent::SessionCreated {
                context_id: "a".into()
            }
            .name(),
            "session-created"
        );
    }
}
