// src/watch/trigger.rs

use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Decides which non-ignored paths may arm the debouncer.
///
/// Without a restriction every path qualifies. With `--go`, only files whose
/// name matches the source extension do.
#[derive(Debug, Clone, Default)]
pub struct TriggerFilter {
    sources: Option<GlobSet>,
}

impl TriggerFilter {
    pub fn any() -> Self {
        Self { sources: None }
    }

    /// Restrict triggers to files ending in `.{extension}`.
    pub fn source_extension(extension: &str) -> Result<Self> {
        let pattern = format!("*.{extension}");
        let glob = Glob::new(&pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        Ok(Self {
            sources: Some(builder.build()?),
        })
    }

    pub fn accepts(&self, path: &Path) -> bool {
        match &self.sources {
            None => true,
            Some(set) => path.file_name().is_some_and(|name| set.is_match(name)),
        }
    }
}
