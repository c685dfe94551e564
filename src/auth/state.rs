// Observable session state shared by the manager and the HTTP client

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;

use super::types::SessionState;

/// Session state plus the bookkeeping that guards it against stale results
pub struct SessionStatus {
    tx: watch::Sender<SessionState>,

    /// Bumped by explicit user transitions (login, logout)
    epoch: AtomicU64,

    /// True while a startup check is running
    checking: AtomicBool,
}

impl SessionStatus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Unknown);
        Self {
            tx,
            epoch: AtomicU64::new(0),
            checking: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Apply a user-initiated transition, invalidating in-flight results
    pub fn transition(&self, state: SessionState) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.set(state);
    }

    /// Apply a transition only if no user transition happened since `epoch`
    pub fn set_if_current(&self, epoch: u64, state: SessionState) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            applied = true;
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if !applied {
            tracing::debug!(?state, "Ignoring stale session transition");
        }
        applied
    }

    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::SeqCst)
    }

    pub(crate) fn set_checking(&self, checking: bool) {
        self.checking.store(checking, Ordering::SeqCst);
    }

    fn set(&self, state: SessionState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            tracing::info!(from = ?previous, to = ?state, "Session state changed");
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}
