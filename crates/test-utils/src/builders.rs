#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use pulse::cli::CliArgs;
use pulse::config::{Config, RawConfigFile};
use pulse::exec::{BuildSpec, RunSpec};
use pulse::types::StopPolicy;

/// Builder for `Config` to simplify test setup.
///
/// Starts from the same defaults the CLI would produce for `root` as the
/// current directory.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let config = Config::resolve(&CliArgs::default(), RawConfigFile::default(), root.as_ref());
        Self { config }
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.excludes.push(pattern.to_string());
        self
    }

    /// Replace the default watch dir (the root) on first call.
    pub fn with_watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        if self.config.watch_dirs == [self.config.project_root.clone()] {
            self.config.watch_dirs.clear();
        }
        self.config.watch_dirs.push(dir.into());
        self
    }

    pub fn without_preset(mut self) -> Self {
        self.config.use_preset = false;
        self
    }

    pub fn only_go(mut self) -> Self {
        self.config.only_go = true;
        self
    }

    pub fn with_build_tool(mut self, tool: &[&str]) -> Self {
        self.config.build_tool = tool.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_build_arg(mut self, arg: &str) -> Self {
        self.config.build_args.push(arg.to_string());
        self
    }

    pub fn with_prebuild(mut self, cmd: &str) -> Self {
        self.config.prebuild = Some(cmd.to_string());
        self
    }

    pub fn with_run_arg(mut self, arg: &str) -> Self {
        self.config.run_args.push(arg.to_string());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_dir = dir.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.config.debounce = debounce;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.config.grace_period = grace;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.config.stop_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Build spec whose "build tool" is an arbitrary shell script.
///
/// The script sees the usual `-o <output> <args...> <package>` arguments as
/// `$1..$n`, so `$2` is the output path.
pub fn shell_build_spec(script: &str, output: impl Into<PathBuf>, package: impl Into<PathBuf>) -> BuildSpec {
    BuildSpec {
        package: package.into(),
        output: output.into(),
        build_tool: vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "build".to_string(),
        ],
        build_args: Vec::new(),
        prebuild: None,
    }
}

/// Run spec with a short grace period.
pub fn run_spec(binary: impl Into<PathBuf>, working_dir: impl Into<PathBuf>, grace: Duration) -> RunSpec {
    RunSpec {
        binary: binary.into(),
        working_dir: working_dir.into(),
        args: Vec::new(),
        grace_period: grace,
    }
}
