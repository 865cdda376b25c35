use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use notify::Event;
use notify::event::{
    AccessKind, CreateKind, DataChange, EventKind, MetadataKind, ModifyKind, RemoveKind, RenameMode,
};
use tokio::sync::mpsc;

use pulse::errors::{PulseError, Result};
use pulse::watch::{FileNotifier, NotifyEvent};

/// Notifier that records subscribed directories instead of talking to the OS.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    added: Arc<Mutex<Vec<PathBuf>>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `add` fail for this directory.
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.failing.lock().unwrap().insert(path.into());
    }

    pub fn added(&self) -> Vec<PathBuf> {
        self.added.lock().unwrap().clone()
    }

    pub fn was_added(&self, path: impl AsRef<Path>) -> bool {
        self.added.lock().unwrap().iter().any(|p| p == path.as_ref())
    }
}

impl FileNotifier for RecordingNotifier {
    fn add(&mut self, path: &Path) -> Result<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(PulseError::Other(anyhow!("subscription refused: {}", path.display())));
        }
        self.added.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Channel pair standing in for the native event stream.
pub fn event_channel() -> (mpsc::UnboundedSender<NotifyEvent>, mpsc::UnboundedReceiver<NotifyEvent>) {
    mpsc::unbounded_channel()
}

pub fn create_file(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(path.into()))
}

pub fn create_dir(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Create(CreateKind::Folder)).add_path(path.into()))
}

pub fn modify_data(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path.into()))
}

pub fn modify_metadata(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))).add_path(path.into()))
}

pub fn rename_to(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To))).add_path(path.into()))
}

pub fn rename_from(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From))).add_path(path.into()))
}

pub fn remove_dir(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(path.into()))
}

pub fn remove_file(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.into()))
}

pub fn access(path: impl Into<PathBuf>) -> NotifyEvent {
    Ok(Event::new(EventKind::Access(AccessKind::Read)).add_path(path.into()))
}

pub fn native_error(msg: &str) -> NotifyEvent {
    Err(notify::Error::generic(msg))
}
