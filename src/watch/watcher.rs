// src/watch/watcher.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::config::model::{DEFAULT_DEBOUNCE, SOURCE_EXTENSION};
use crate::errors::{PulseError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::ChangeSignal;
use crate::watch::debounce::Debouncer;
use crate::watch::ignore::IgnoreMatcher;
use crate::watch::notifier::{FileNotifier, NotifyBackend, NotifyEvent};
use crate::watch::trigger::TriggerFilter;

/// Output of [`FileWatcher::listen`].
///
/// `signals` closes when the watcher stops. `handle` resolves to the reason:
/// `Ok(())` after cancellation, the terminal error otherwise.
#[derive(Debug)]
pub struct WatchSignal {
    pub signals: mpsc::Receiver<ChangeSignal>,
    pub handle: JoinHandle<Result<()>>,
}

/// Watches one or more directory trees and turns relevant native events into
/// debounced [`ChangeSignal`]s.
pub struct FileWatcher<N: FileNotifier> {
    notifier: N,
    events: mpsc::UnboundedReceiver<NotifyEvent>,
    matcher: Arc<IgnoreMatcher>,
    filter: TriggerFilter,
    fs: Arc<dyn FileSystem>,
    debounce: Duration,
}

impl<N: FileNotifier> std::fmt::Debug for FileWatcher<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("matcher", &self.matcher)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl FileWatcher<NotifyBackend> {
    /// Production watcher backed by `notify`.
    pub fn from_config(cfg: &Config, matcher: IgnoreMatcher) -> Result<Self> {
        let (notifier, events) = NotifyBackend::new()?;
        let filter = if cfg.only_go {
            TriggerFilter::source_extension(SOURCE_EXTENSION)?
        } else {
            TriggerFilter::any()
        };
        Ok(Self::new(notifier, events, matcher)
            .with_filter(filter)
            .with_debounce(cfg.debounce))
    }
}

impl<N: FileNotifier> FileWatcher<N> {
    pub fn new(
        notifier: N,
        events: mpsc::UnboundedReceiver<NotifyEvent>,
        matcher: IgnoreMatcher,
    ) -> Self {
        Self {
            notifier,
            events,
            matcher: Arc::new(matcher),
            filter: TriggerFilter::any(),
            fs: Arc::new(RealFileSystem),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_filter(mut self, filter: TriggerFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Subscribe `root` and every non-ignored directory below it.
    ///
    /// Ignored directories are not descended into. Unreadable directories and
    /// failed subscriptions are logged and skipped; only cancellation aborts
    /// the walk.
    pub fn add_directory(&mut self, root: &Path, cancel: &CancellationToken) -> Result<()> {
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(PulseError::Cancelled);
            }

            if self.matcher.is_ignored(&dir, true) {
                debug!(path = %dir.display(), "skipping ignored directory");
                continue;
            }

            match self.notifier.add(&dir) {
                Ok(()) => debug!(path = %dir.display(), "added directory to watcher"),
                Err(err) => {
                    error!(path = %dir.display(), error = %err, "failed to add directory to watcher")
                }
            }

            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    error!(path = %dir.display(), error = %err, "failed walking directory");
                    continue;
                }
            };

            // Reverse so the walk visits siblings in directory order.
            for entry in entries.into_iter().rev() {
                if self.fs.is_dir(&entry) && !self.fs.is_symlink(&entry) {
                    stack.push(entry);
                }
            }
        }

        Ok(())
    }

    /// Start the event loop in a background task.
    ///
    /// A change signal is armed immediately so the first build happens
    /// without an edit. The signal channel holds at most one pending signal;
    /// further pulses while one is pending are folded into it.
    pub fn listen(self, cancel: CancellationToken) -> WatchSignal {
        let (signal_tx, signals) = mpsc::channel::<ChangeSignal>(1);
        let handle = tokio::spawn(self.run(signal_tx, cancel));
        WatchSignal { signals, handle }
    }

    async fn run(mut self, signal_tx: mpsc::Sender<ChangeSignal>, cancel: CancellationToken) -> Result<()> {
        let debouncer = Debouncer::new(self.debounce, move || {
            // Full means a signal is already pending; it covers this change.
            let _ = signal_tx.try_send(ChangeSignal);
        });

        info!(debounce = ?self.debounce, "file watcher started");
        debouncer.arm();

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                event = self.events.recv() => match event {
                    Some(Ok(event)) => {
                        if self.handle_event(&event, &cancel) {
                            debouncer.arm();
                        }
                    }
                    Some(Err(err)) => {
                        error!(error = %err, "file watcher error");
                        break Err(PulseError::WatchError(err));
                    }
                    None => {
                        error!("native event channel closed");
                        break Err(PulseError::Other(anyhow!("native event channel closed")));
                    }
                },
            }
        };

        // Dropping the debouncer releases the last signal sender and closes
        // the channel for the orchestrator.
        debouncer.cancel();
        drop(debouncer);
        debug!("watcher event loop finished");
        result
    }

    /// Apply one native event. Returns true if it should arm the debouncer.
    fn handle_event(&mut self, event: &Event, cancel: &CancellationToken) -> bool {
        let mut fire = false;

        for path in &event.paths {
            let is_dir = self.fs.is_dir(path) || names_directory(&event.kind);

            if self.is_ignored(path, is_dir) {
                debug!(path = %path.display(), kind = ?event.kind, "ignoring event for path");
                continue;
            }

            match event.kind {
                EventKind::Create(_) => {
                    debug!(path = %path.display(), "create event");
                    if is_dir {
                        self.subscribe_new_directory(path, cancel);
                    }
                    fire |= self.filter.accepts(path);
                }
                // Permission / attribute-only changes never rebuild.
                EventKind::Modify(ModifyKind::Metadata(_)) => {}
                EventKind::Modify(ModifyKind::Name(_)) => {
                    // A directory moved into the tree needs subscribing too.
                    if is_dir {
                        self.subscribe_new_directory(path, cancel);
                    }
                    fire |= self.filter.accepts(path);
                }
                EventKind::Modify(_) | EventKind::Remove(_) => {
                    fire |= self.filter.accepts(path);
                }
                _ => {}
            }
        }

        fire
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.matcher.is_ignored(path, is_dir) {
            return true;
        }
        // A path that is already gone may have been a directory, which
        // directory-only patterns such as `tmp/` must still catch.
        !is_dir && !self.fs.exists(path) && self.matcher.is_ignored(path, true)
    }

    fn subscribe_new_directory(&mut self, path: &Path, cancel: &CancellationToken) {
        if let Err(err) = self.add_directory(path, cancel) {
            warn!(path = %path.display(), error = %err, "failed to watch new directory");
        }
    }
}

fn names_directory(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
    )
}
