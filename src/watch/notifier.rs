// src/watch/notifier.rs

//! Native change-notification source.
//!
//! [`FileNotifier`] is the seam between the watcher logic and `notify`:
//! production uses [`NotifyBackend`], tests provide a recorder and push
//! synthetic events into the channel themselves.

use std::path::Path;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Result;

/// Raw event (or error) as delivered by the native backend.
pub type NotifyEvent = notify::Result<Event>;

/// Something that can subscribe a single directory for change events.
pub trait FileNotifier: Send + 'static {
    /// Subscribe `path` non-recursively; subdirectories are added by the
    /// watcher's own walk so that ignored subtrees are never subscribed.
    fn add(&mut self, path: &Path) -> Result<()>;
}

/// `notify`-based backend.
///
/// Owning this keeps the underlying `RecommendedWatcher` alive; dropping it
/// stops all subscriptions and closes the event channel.
pub struct NotifyBackend {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish()
    }
}

impl NotifyBackend {
    /// Create the backend and the channel its events are forwarded to.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<NotifyEvent>)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<NotifyEvent>();

        // Called synchronously on notify's own thread.
        let inner = RecommendedWatcher::new(
            move |res: NotifyEvent| {
                if event_tx.send(res).is_err() {
                    debug!("watcher receiver dropped; discarding native event");
                }
            },
            Config::default(),
        )?;

        Ok((Self { inner }, event_rx))
    }
}

impl FileNotifier for NotifyBackend {
    fn add(&mut self, path: &Path) -> Result<()> {
        self.inner.watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }
}
