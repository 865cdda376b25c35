// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::CliArgs;
use crate::types::StopPolicy;

/// Patterns excluded unless `--xp` / `no_preset = true` is given.
pub const PRESET_EXCLUDES: [&str; 6] = [
    ".git",
    ".idea",
    ".yarn",
    ".vscode",
    ".github",
    "node_modules",
];

/// Default build tool invocation; `-o <out> <args...> <package>` is appended.
pub const DEFAULT_BUILD_TOOL: [&str; 2] = ["go", "build"];

/// Extension of files that trigger a rebuild when `--go` is set.
pub const SOURCE_EXTENSION: &str = "go";

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Optional project configuration as read from `pulse.toml`.
///
/// ```toml
/// exclude = ["tmp", "*.log"]
/// watch_dirs = ["cmd", "internal"]
/// build_args = ["-race"]
/// prebuild = "go generate ./..."
/// debounce_ms = 200
/// stop_policy = "after-build"
/// ```
///
/// Every key is optional. Command-line flags take precedence over scalar
/// values here; list values are concatenated (file first, then CLI).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfigFile {
    pub exclude: Vec<String>,
    pub watch_dirs: Vec<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub build_tool: Option<Vec<String>>,
    pub build_args: Vec<String>,
    pub prebuild: Option<String>,
    pub no_preset: Option<bool>,
    pub only_go: Option<bool>,
    pub debounce_ms: Option<u64>,
    pub grace_period_ms: Option<u64>,
    pub stop_policy: Option<StopPolicy>,
}

/// Fully resolved, immutable configuration.
///
/// Built once at startup and shared (behind an `Arc`) by the watcher,
/// builder, runner and orchestrator. All paths are absolute.
#[derive(Debug, Clone)]
pub struct Config {
    /// Package handed to the build tool.
    pub package_path: PathBuf,
    /// Directory holding `.gitignore` / `.pulseignore`; ignore patterns are
    /// anchored here.
    pub project_root: PathBuf,
    pub watch_dirs: Vec<PathBuf>,
    /// Working directory of the spawned program.
    pub working_dir: PathBuf,
    /// Patterns from the config file and `-x` flags.
    pub excludes: Vec<String>,
    pub use_preset: bool,
    pub only_go: bool,
    pub build_tool: Vec<String>,
    pub build_args: Vec<String>,
    pub prebuild: Option<String>,
    pub run_args: Vec<String>,
    pub debounce: Duration,
    pub grace_period: Duration,
    pub stop_policy: StopPolicy,
}

impl Config {
    /// Merge CLI arguments over the (possibly empty) config file.
    ///
    /// Relative paths are resolved against `cwd`. No filesystem checks are
    /// done here; see [`crate::config::validate`].
    pub fn resolve(cli: &CliArgs, file: RawConfigFile, cwd: &Path) -> Self {
        // `components()` drops interior `.` segments, so `./cmd/.` and
        // `cmd` resolve to the same path (and the same output binary name).
        let absolute = |p: &Path| -> PathBuf {
            let joined = if p.is_absolute() {
                p.to_path_buf()
            } else {
                cwd.join(p)
            };
            joined.components().collect()
        };

        let package_path = absolute(cli.package.as_deref().unwrap_or(Path::new(".")));

        let mut watch_dirs: Vec<PathBuf> = file
            .watch_dirs
            .iter()
            .chain(cli.watch_dirs.iter())
            .map(|p| absolute(p))
            .collect();
        if watch_dirs.is_empty() {
            watch_dirs.push(cwd.to_path_buf());
        }

        let working_dir = cli
            .working_dir
            .as_deref()
            .or(file.working_dir.as_deref())
            .map(|p| absolute(p))
            .unwrap_or_else(|| cwd.to_path_buf());

        let mut excludes = file.exclude;
        excludes.extend(cli.exclude.iter().cloned());

        let mut build_args = file.build_args;
        build_args.extend(cli.build_args.iter().cloned());

        let build_tool = file
            .build_tool
            .unwrap_or_else(|| DEFAULT_BUILD_TOOL.iter().map(|s| s.to_string()).collect());

        let debounce = cli
            .debounce_ms
            .or(file.debounce_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);
        let grace_period = cli
            .grace_period_ms
            .or(file.grace_period_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_GRACE_PERIOD);

        Self {
            package_path,
            project_root: cwd.to_path_buf(),
            watch_dirs,
            working_dir,
            excludes,
            use_preset: !(cli.no_preset || file.no_preset.unwrap_or(false)),
            only_go: cli.only_go || file.only_go.unwrap_or(false),
            build_tool,
            build_args,
            prebuild: cli.prebuild.clone().or(file.prebuild).filter(|s| !s.trim().is_empty()),
            run_args: cli.run_args.clone(),
            debounce,
            grace_period,
            stop_policy: cli.stop_policy.or(file.stop_policy).unwrap_or_default(),
        }
    }

    /// Built-in preset patterns, or nothing if the preset is disabled.
    pub fn preset_excludes(&self) -> Vec<String> {
        if self.use_preset {
            PRESET_EXCLUDES.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        }
    }
}
