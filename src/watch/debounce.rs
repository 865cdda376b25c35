// src/watch/debounce.rs

//! Trailing-edge debouncer.
//!
//! `arm()` (re)starts a timer; the callback runs once the timer survives a
//! full quiet period without another `arm()`. `cancel()` disables the
//! debouncer for good.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct DebounceState {
    /// Bumped on every `arm()`; a timer only fires if it still owns the
    /// latest generation.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    cancelled: bool,
}

/// Collapses bursts of pulses into a single delayed callback.
///
/// `arm`, `cancel` and the timer's own firing all serialize on one mutex,
/// so a cancelled debouncer never fires and a superseded timer never fires.
/// Must be used from within a Tokio runtime.
pub struct Debouncer {
    quiet: Duration,
    state: Arc<Mutex<DebounceState>>,
    callback: Callback,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl Debouncer {
    pub fn new<F>(quiet: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            quiet,
            state: Arc::new(Mutex::new(DebounceState::default())),
            callback: Arc::new(callback),
        }
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// Schedule the callback after the quiet period, restarting the timer if
    /// one is already pending. No-op after [`Debouncer::cancel`].
    pub fn arm(&self) {
        let mut state = lock(&self.state);
        if state.cancelled {
            return;
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation = state.generation.wrapping_add(1);

        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let callback = Arc::clone(&self.callback);
        let quiet = self.quiet;

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;

            let mut state = lock(&shared);
            if state.cancelled || state.generation != generation {
                return;
            }
            state.timer = None;
            callback();
        }));
    }

    /// Permanently disable firing and release the pending timer.
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        state.cancelled = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.state).cancelled
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
