// tests/watcher_walk.rs

mod common;
use crate::common::init_tracing;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pulse::errors::PulseError;
use pulse::fs::mock::MockFileSystem;
use pulse::watch::{FileWatcher, IgnoreMatcher, IgnoreRuleSet};
use pulse_test_utils::notifier::{RecordingNotifier, event_channel};

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.go", "package main");
    fs.add_file("/proj/internal/api/handler.go", "package api");
    fs.add_file("/proj/internal/db/db.go", "package db");
    fs.add_file("/proj/.git/HEAD", "ref: refs/heads/main");
    fs.add_file("/proj/web/node_modules/react/index.js", "");
    fs.add_file("/proj/web/app.js", "");
    fs.add_dir("/proj/tmp/cache");
    fs
}

fn watcher_for(
    fs: &MockFileSystem,
    patterns: &[&str],
) -> (FileWatcher<RecordingNotifier>, RecordingNotifier) {
    let rules = IgnoreRuleSet::merge([patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>()]);
    let matcher = IgnoreMatcher::new("/proj", &rules).unwrap();
    let notifier = RecordingNotifier::new();
    let (_tx, rx) = event_channel();
    let watcher = FileWatcher::new(notifier.clone(), rx, matcher).with_fs(Arc::new(fs.clone()));
    (watcher, notifier)
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[test]
fn subscribes_every_directory_in_walk_order() {
    init_tracing();
    let fs = project();
    let (mut watcher, notifier) = watcher_for(&fs, &[]);

    watcher
        .add_directory(&PathBuf::from("/proj"), &CancellationToken::new())
        .unwrap();

    assert_eq!(
        notifier.added(),
        paths(&[
            "/proj",
            "/proj/.git",
            "/proj/internal",
            "/proj/internal/api",
            "/proj/internal/db",
            "/proj/tmp",
            "/proj/tmp/cache",
            "/proj/web",
            "/proj/web/node_modules",
            "/proj/web/node_modules/react",
        ])
    );
}

#[test]
fn ignored_directories_are_never_descended() {
    init_tracing();
    let fs = project();
    let (mut watcher, notifier) = watcher_for(&fs, &[".git", "node_modules", "tmp"]);

    watcher
        .add_directory(&PathBuf::from("/proj"), &CancellationToken::new())
        .unwrap();

    assert_eq!(
        notifier.added(),
        paths(&[
            "/proj",
            "/proj/internal",
            "/proj/internal/api",
            "/proj/internal/db",
            "/proj/web",
        ])
    );
}

#[test]
fn unreadable_directory_is_skipped_and_walk_continues() {
    init_tracing();
    let fs = project();
    fs.make_unreadable("/proj/internal");
    let (mut watcher, notifier) = watcher_for(&fs, &[".git", "node_modules"]);

    watcher
        .add_directory(&PathBuf::from("/proj"), &CancellationToken::new())
        .unwrap();

    let added = notifier.added();
    // Subscribed, but its children could not be listed.
    assert!(added.contains(&PathBuf::from("/proj/internal")));
    assert!(!added.contains(&PathBuf::from("/proj/internal/api")));
    assert!(added.contains(&PathBuf::from("/proj/web")));
    assert!(added.contains(&PathBuf::from("/proj/tmp/cache")));
}

#[test]
fn failed_subscription_is_logged_and_walk_continues() {
    init_tracing();
    let fs = project();
    let (mut watcher, notifier) = watcher_for(&fs, &[]);
    notifier.fail_on("/proj/internal");

    watcher
        .add_directory(&PathBuf::from("/proj"), &CancellationToken::new())
        .unwrap();

    assert!(!notifier.was_added("/proj/internal"));
    assert!(notifier.was_added("/proj/internal/api"));
    assert!(notifier.was_added("/proj/internal/db"));
}

#[test]
fn cancelled_token_aborts_the_walk() {
    init_tracing();
    let fs = project();
    let (mut watcher, notifier) = watcher_for(&fs, &[]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = watcher
        .add_directory(&PathBuf::from("/proj"), &cancel)
        .unwrap_err();

    assert!(matches!(err, PulseError::Cancelled));
    assert!(notifier.added().is_empty());
}

#[test]
fn walk_can_start_below_the_project_root() {
    init_tracing();
    let fs = project();
    let (mut watcher, notifier) = watcher_for(&fs, &[]);

    watcher
        .add_directory(&PathBuf::from("/proj/internal"), &CancellationToken::new())
        .unwrap();

    assert_eq!(
        notifier.added(),
        paths(&["/proj/internal", "/proj/internal/api", "/proj/internal/db"])
    );
}
