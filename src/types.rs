// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// When the running instance is stopped relative to a rebuild.
///
/// - `Immediately`: every change stops the running process right away; it is
///   started again only after the next successful build (default).
/// - `AfterBuild`: the old process keeps running while the rebuild is in
///   flight and is only replaced once the build succeeds. A failed build
///   leaves the old process alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopPolicy {
    #[default]
    Immediately,
    AfterBuild,
}

impl FromStr for StopPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "immediately" => Ok(StopPolicy::Immediately),
            "after-build" => Ok(StopPolicy::AfterBuild),
            other => Err(format!(
                "invalid stop policy: {other} (expected \"immediately\" or \"after-build\")"
            )),
        }
    }
}

impl fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopPolicy::Immediately => f.write_str("immediately"),
            StopPolicy::AfterBuild => f.write_str("after-build"),
        }
    }
}

/// A unit pulse meaning "the watched tree changed since the last build input".
///
/// It deliberately carries no path: several edits may be folded into one
/// signal by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal;
