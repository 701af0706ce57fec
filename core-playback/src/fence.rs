//! Context fencing for speculative work
//!
//! Long-running work tied to a session (artwork resolution) captures a
//! [`ContextFence`] when it starts and checks it before every externally
//! visible step. A replaced session makes the check fail and the work returns
//! [`Fenced::Superseded`] instead of writing stale results.

use crate::store::PlayerStore;
use tracing::debug;

/// Outcome of fenced work.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Fenced<T> {
    /// The session is still the one the work started for.
    Current(T),
    /// A newer session replaced it; the result was dropped.
    Superseded,
}

impl<T> Fenced<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Fenced::Superseded)
    }

    pub fn current(self) -> Option<T> {
        match self {
            Fenced::Current(value) => Some(value),
            Fenced::Superseded => None,
        }
    }
}

/// Snapshot of the session's context id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFence {
    context_id: String,
}

impl ContextFence {
    /// Capture the current session's context, if there is a session.
    pub fn capture(store: &PlayerStore) -> Option<Self> {
        store.context_id().map(|context_id| Self { context_id })
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Whether the live session still matches.
    pub fn holds(&self, store: &PlayerStore) -> bool {
        let holds = store.context_id().as_deref() == Some(self.context_id.as_str());
        if !holds {
            debug!(context_id = %self.context_id, "Context superseded");
        }
        holds
    }
}
