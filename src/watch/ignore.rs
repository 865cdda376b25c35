// src/watch/ignore.rs

//! Ignore rules: which paths never trigger a rebuild and which directories
//! are never subscribed.
//!
//! Patterns come from (in order) `.gitignore`, `.pulseignore`, the config
//! file / `-x` flags and the built-in preset. Matching uses gitignore
//! semantics via the `ignore` crate, anchored at the project root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, error};

use crate::config::Config;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::watch::path_utils::relative_path;

pub const GITIGNORE_FILE: &str = ".gitignore";
pub const PULSEIGNORE_FILE: &str = ".pulseignore";

const UTF8_BOM: char = '\u{feff}';

/// Ordered, de-duplicated list of ignore patterns.
///
/// Immutable once built; the first occurrence of a pattern keeps its
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRuleSet {
    patterns: Vec<String>,
}

impl IgnoreRuleSet {
    /// Merge several pattern lists, dropping blank lines and duplicates.
    pub fn merge<I, L>(sources: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();
        for source in sources {
            for pattern in source {
                if pattern.trim().is_empty() {
                    continue;
                }
                if seen.insert(pattern.clone()) {
                    patterns.push(pattern);
                }
            }
        }
        Self { patterns }
    }

    /// Collect every pattern source for this configuration.
    pub fn from_config(cfg: &Config, fs: &dyn FileSystem) -> Self {
        let gitignore = read_ignore_file(fs, &cfg.project_root.join(GITIGNORE_FILE));
        let pulseignore = read_ignore_file(fs, &cfg.project_root.join(PULSEIGNORE_FILE));
        Self::merge([
            gitignore,
            pulseignore,
            cfg.excludes.clone(),
            cfg.preset_excludes(),
        ])
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Read an ignore file into lines.
///
/// A missing file yields no patterns. An unreadable file is logged and also
/// yields no patterns, so a broken `.gitignore` never prevents startup.
pub fn read_ignore_file(fs: &dyn FileSystem, path: &Path) -> Vec<String> {
    if !fs.exists(path) {
        return Vec::new();
    }
    match fs.read_to_string(path) {
        Ok(contents) => {
            let lines = read_lines(&contents);
            debug!(path = %path.display(), patterns = ?lines, "read ignore file");
            lines
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read ignore file");
            Vec::new()
        }
    }
}

/// Split file contents into lines, stripping a leading UTF-8 BOM and
/// Windows line endings.
pub fn read_lines(contents: &str) -> Vec<String> {
    let contents = contents.strip_prefix(UTF8_BOM).unwrap_or(contents);
    contents
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Predicate over paths, compiled from an [`IgnoreRuleSet`].
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: PathBuf,
    gitignore: Gitignore,
}

impl IgnoreMatcher {
    /// Compile the rules. Patterns are anchored at `root`.
    pub fn new(root: impl Into<PathBuf>, rules: &IgnoreRuleSet) -> Result<Self> {
        let root = root.into();
        let mut builder = GitignoreBuilder::new(&root);
        for pattern in rules.patterns() {
            builder.add_line(None, pattern)?;
        }
        let gitignore = builder.build()?;
        Ok(Self { root, gitignore })
    }

    /// A matcher that ignores nothing.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            gitignore: Gitignore::empty(),
        }
    }

    /// True if `path`, or any directory containing it below the root, is
    /// matched by an ignore pattern.
    ///
    /// Paths outside the root are matched as given, so unanchored patterns
    /// such as `node_modules` still apply to other watch roots.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let rel = relative_path(&self.root, path).unwrap_or_else(|| path.to_path_buf());
        if rel.as_os_str().is_empty() {
            return false;
        }

        let own = self.gitignore.matched(&rel, is_dir);
        if own.is_ignore() {
            return true;
        }
        if own.is_whitelist() {
            return false;
        }

        rel.ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty() && p.parent().is_some())
            .any(|p| self.gitignore.matched(p, true).is_ignore())
    }
}
