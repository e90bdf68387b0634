//! Load completion notifications
//!
//! Control-side observers (UI, tests, the load worker's callers) block on a
//! `LoadNotifier` instead of polling `is_ready`. Each event bumps a
//! generation counter so waiters can tell new events from ones they've
//! already seen.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::EngineKind;

/// Outcome of a load or unload on one adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Loaded { kind: EngineKind, path: PathBuf },
    Failed { kind: EngineKind, path: PathBuf, reason: String },
    Unloaded { kind: EngineKind },
}

#[derive(Debug, Default)]
struct NotifierState {
    generation: u64,
    last: Option<LoadEvent>,
}

/// Broadcasts load events to any number of waiting threads
#[derive(Debug, Default)]
pub struct LoadNotifier {
    state: Mutex<NotifierState>,
    changed: Condvar,
}

impl LoadNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and wake every waiter
    pub fn notify(&self, event: LoadEvent) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.last = Some(event);
        drop(state);
        self.changed.notify_all();
    }

    /// Number of events recorded so far
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn last_event(&self) -> Option<LoadEvent> {
        self.state.lock().last.clone()
    }

    /// Block until an event newer than `after` arrives or `timeout` passes
    ///
    /// Returns the newest event, or `None` on timeout.
    pub fn wait_for(&self, after: u64, timeout: Duration) -> Option<LoadEvent> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.generation <= after {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        if state.generation > after {
            state.last.clone()
        } else {
            None
        }
    }
}
