// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::StopPolicy;

/// Command-line arguments for `pulse`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "pulse",
    version,
    about = "Rebuild and restart a Go program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Package to build. Default: the current directory.
    #[arg(value_name = "PACKAGE")]
    pub package: Option<PathBuf>,

    /// Exclude a directory or a file (gitignore syntax). Can be repeated.
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Directory to watch. Can be repeated. Default: the current directory.
    #[arg(short = 'w', long = "wd", visible_alias = "watch-dir", value_name = "DIR")]
    pub watch_dirs: Vec<PathBuf>,

    /// Working directory of the executable.
    #[arg(long = "cwd", value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Additional build tool argument. Can be repeated.
    #[arg(
        long = "build-args",
        alias = "buildArgs",
        value_name = "ARG",
        allow_hyphen_values = true
    )]
    pub build_args: Vec<String>,

    /// Shell command to run before every build.
    #[arg(long = "pbc", visible_alias = "prebuild", value_name = "COMMAND")]
    pub prebuild: Option<String>,

    /// Disable the built-in exclude preset (.git, node_modules, ...).
    #[arg(long = "xp", visible_alias = "no-preset")]
    pub no_preset: bool,

    /// Reload only when a `.go` file changes.
    #[arg(long = "go")]
    pub only_go: bool,

    /// Path to a TOML config file. Default: `pulse.toml` if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Quiet period in milliseconds before a burst of changes triggers a build.
    #[arg(long = "debounce", value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Grace period in milliseconds between interrupt and force-kill.
    #[arg(long = "grace", value_name = "MS")]
    pub grace_period_ms: Option<u64>,

    /// When to stop the running program relative to a rebuild.
    #[arg(long, value_name = "POLICY")]
    pub stop_policy: Option<StopPolicy>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LOG_LEVEL` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Arguments passed to the program after `--`.
    #[arg(last = true, value_name = "ARGS")]
    pub run_args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
