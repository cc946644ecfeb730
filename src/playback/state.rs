use crate::transform::StrategyKind;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

/// Lifecycle of a [`super::PlaybackController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded.
    Idle,
    /// A video is loaded and positioned, not playing.
    Loaded,
    Running,
    /// Halted by the user or by a processing failure; the video stays loaded.
    Stopped,
    /// End of stream reached; moves on to `Loaded` once rewound.
    Ended,
}

/// State shared between the controller and its processing thread.
///
/// The condition variable doubles as the interruptible pacing timer: a stop
/// request wakes the worker out of its inter-frame wait.
pub(crate) struct Shared {
    state: Mutex<PlaybackState>,
    changed: Condvar,
    strategy: Mutex<StrategyKind>,
}

impl Shared {
    pub(crate) fn new(strategy: StrategyKind) -> Self {
        Self {
            state: Mutex::new(PlaybackState::Idle),
            changed: Condvar::new(),
            strategy: Mutex::new(strategy),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        // Poisoning cannot leave a Copy enum half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn state(&self) -> PlaybackState {
        *self.lock()
    }

    pub(crate) fn set(&self, next: PlaybackState) {
        *self.lock() = next;
        self.changed.notify_all();
    }

    /// Move to `next` only if the current state is `from`.
    pub(crate) fn transition(&self, from: PlaybackState, next: PlaybackState) -> bool {
        let mut state = self.lock();
        if *state != from {
            return false;
        }
        *state = next;
        drop(state);
        self.changed.notify_all();
        true
    }

    /// Sleep until `deadline` or until the state leaves `Running`.
    /// Returns whether playback is still running.
    pub(crate) fn pace_until(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        while *state == PlaybackState::Running {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        false
    }

    pub(crate) fn strategy(&self) -> StrategyKind {
        *self.strategy.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_strategy(&self, kind: StrategyKind) {
        *self.strategy.lock().unwrap_or_else(|e| e.into_inner()) = kind;
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new(StrategyKind::default())
    }
}
