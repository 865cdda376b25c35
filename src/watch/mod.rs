// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Building the ignore rule set and matcher (`.gitignore`, `.pulseignore`,
//!   `-x` patterns, built-in preset).
//! - Subscribing watch roots directory by directory, skipping ignored
//!   subtrees and picking up new directories as they appear.
//! - Debouncing bursts of native events into a single [`ChangeSignal`].
//!
//! It does **not** know about builds or processes; it only says "something
//! changed".
//!
//! [`ChangeSignal`]: crate::types::ChangeSignal

pub mod debounce;
pub mod ignore;
pub mod notifier;
pub mod path_utils;
pub mod trigger;
pub mod watcher;

pub use debounce::Debouncer;
pub use ignore::{IgnoreMatcher, IgnoreRuleSet};
pub use notifier::{FileNotifier, NotifyBackend, NotifyEvent};
pub use trigger::TriggerFilter;
pub use watcher::{FileWatcher, WatchSignal};
